// Explicit session context handed to every authenticated operation
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::client::{ApiError, MarketplaceApi};
use crate::offer::ViewerPolicy;

// Only accounts with this role may use the customer front end
pub const CUSTOMER_ROLE: &str = "user";

// Shown for customers without a usable name
pub const DEFAULT_INITIALS: &str = "CU";

#[derive(Error, Debug, PartialEq)]
pub enum SessionError {
    #[error("Please enter both email and password.")]
    MissingCredentials,

    #[error("Access denied. Only customers can log in here.")]
    AccessDenied { role: String },

    #[error("Login response did not include a token")]
    MissingToken,
}

#[derive(Error, Debug)]
pub enum SignInError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Login failed: {0}")]
    Api(#[from] ApiError),
}

#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(SessionError::MissingCredentials);
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub can_view_all_offers: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: String,
    pub user: UserRecord,
}

#[derive(Clone, PartialEq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    token: BearerToken,
    user: UserRecord,
}

impl Session {
    pub fn new(token: BearerToken, user: UserRecord) -> Self {
        Self { token, user }
    }

    // Admit a login response only for customer accounts
    pub fn establish(response: LoginResponse) -> Result<Self, SessionError> {
        if response.user.role != CUSTOMER_ROLE {
            return Err(SessionError::AccessDenied {
                role: response.user.role,
            });
        }
        if response.token.trim().is_empty() {
            return Err(SessionError::MissingToken);
        }

        Ok(Self::new(BearerToken::new(response.token), response.user))
    }

    pub fn token(&self) -> &BearerToken {
        &self.token
    }

    pub fn user(&self) -> &UserRecord {
        &self.user
    }

    pub fn customer_id(&self) -> u64 {
        self.user.id
    }

    pub fn display_name(&self) -> &str {
        &self.user.name
    }

    /// Up to two uppercased initials taken from the user's name, or
    /// `DEFAULT_INITIALS` when the name is blank.
    pub fn initials(&self) -> String {
        let initials: String = self
            .user
            .name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect();

        if initials.is_empty() {
            DEFAULT_INITIALS.to_string()
        } else {
            initials
        }
    }

    pub fn viewer_policy(&self) -> ViewerPolicy {
        ViewerPolicy {
            can_view_all_offers: self.user.can_view_all_offers,
        }
    }
}

pub async fn sign_in<A>(api: &A, credentials: &Credentials) -> Result<Session, SignInError>
where
    A: MarketplaceApi + ?Sized,
{
    credentials.validate()?;

    let response = api.login(credentials).await?;
    match Session::establish(response) {
        Ok(session) => {
            info!(customer_id = session.customer_id(), "signed in");
            Ok(session)
        }
        Err(e) => {
            warn!(email = %credentials.email, error = %e, "login rejected");
            Err(e.into())
        }
    }
}
