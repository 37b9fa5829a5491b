// Marketplace API client: typed access to the backend's REST/JSON endpoints
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::fuel_request::{
    AircraftRecord, AircraftRegistration, AircraftType, FuelRequestPayload, RegisteredAircraft,
};
use crate::session::{Credentials, LoginResponse, Session};
use crate::supplier::SupplierRecord;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const BASE_URL_ENV: &str = "FUEL_DESK_API_BASE_URL";
pub const TIMEOUT_ENV: &str = "FUEL_DESK_TIMEOUT_MS";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("API error: {status_code} - {message}")]
    ApiResponseError {
        status_code: u16,
        message: String,
        is_retryable: bool,
    },

    #[error("Could not decode response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::NetworkError(_) | ApiError::Timeout(_) => true,
            ApiError::ApiResponseError { is_retryable, .. } => *is_retryable,
            ApiError::Unauthorized(_) | ApiError::Decode(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub use_system_proxy: bool,
    pub retry_config: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: 10_000,
            use_system_proxy: true,
            retry_config: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    // Defaults overridden by whatever `lookup` yields for the known keys
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            config.base_url = base_url.trim().to_string();
        }

        if let Some(raw) = lookup(TIMEOUT_ENV) {
            config.timeout_ms = raw.trim().parse().map_err(|_| {
                ClientError::ConfigError(format!(
                    "{TIMEOUT_ENV} must be a number of milliseconds, got {raw:?}"
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ClientError::ConfigError(format!(
                "base URL must be http(s), got {:?}",
                self.base_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ClientError::ConfigError(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ClientStats {
    pub requests_sent: usize,
    pub requests_succeeded: usize,
    pub requests_failed: usize,
    pub requests_retried: usize,
    pub average_response_time_ms: f64,
    pub max_response_time_ms: f64,
}

impl ClientStats {
    fn record(&mut self, elapsed: Duration, succeeded: bool) {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;

        self.requests_sent += 1;
        if succeeded {
            self.requests_succeeded += 1;
        } else {
            self.requests_failed += 1;
        }

        let n = self.requests_sent as f64;
        self.average_response_time_ms += (elapsed_ms - self.average_response_time_ms) / n;
        self.max_response_time_ms = self.max_response_time_ms.max(elapsed_ms);
    }
}

#[derive(Debug, Deserialize)]
struct CustomerAircraftResponse {
    #[serde(default)]
    aircrafts: Vec<RegisteredAircraft>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

// Operations the customer front end needs from the marketplace backend
#[async_trait]
pub trait MarketplaceApi: Send + Sync + 'static {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError>;

    async fn list_suppliers(&self, session: &Session) -> Result<Vec<SupplierRecord>, ApiError>;

    async fn supplier(&self, session: &Session, supplier_id: u64)
        -> Result<SupplierRecord, ApiError>;

    async fn aircraft_types(&self) -> Result<Vec<AircraftType>, ApiError>;

    async fn customer_aircraft(
        &self,
        session: &Session,
        customer_id: u64,
    ) -> Result<Vec<RegisteredAircraft>, ApiError>;

    async fn register_aircraft(
        &self,
        session: &Session,
        registration: &AircraftRegistration,
    ) -> Result<AircraftRecord, ApiError>;

    async fn submit_fuel_request(
        &self,
        session: &Session,
        payload: &FuelRequestPayload,
    ) -> Result<(), ApiError>;

    fn stats(&self) -> ClientStats;
}

pub struct HttpMarketplaceClient {
    http: reqwest::Client,
    config: ClientConfig,
    stats: Arc<Mutex<ClientStats>>,
}

#[async_trait]
impl MarketplaceApi for HttpMarketplaceClient {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        let body = self
            .execute(Method::POST, "/auth/login", None, Some(to_body(credentials)?))
            .await?;
        decode(&body)
    }

    async fn list_suppliers(&self, session: &Session) -> Result<Vec<SupplierRecord>, ApiError> {
        let suppliers: Vec<SupplierRecord> = self.get_json("/supplier", Some(session)).await?;
        debug!(count = suppliers.len(), "fetched suppliers");
        Ok(suppliers)
    }

    async fn supplier(
        &self,
        session: &Session,
        supplier_id: u64,
    ) -> Result<SupplierRecord, ApiError> {
        self.get_json(&format!("/supplier/{supplier_id}"), Some(session))
            .await
    }

    async fn aircraft_types(&self) -> Result<Vec<AircraftType>, ApiError> {
        self.get_json("/fuel-requests/aircraft-types", None).await
    }

    async fn customer_aircraft(
        &self,
        session: &Session,
        customer_id: u64,
    ) -> Result<Vec<RegisteredAircraft>, ApiError> {
        let response: CustomerAircraftResponse = self
            .get_json(
                &format!("/fuel-requests/customer/{customer_id}/aircrafts"),
                Some(session),
            )
            .await?;
        Ok(response.aircrafts)
    }

    async fn register_aircraft(
        &self,
        session: &Session,
        registration: &AircraftRegistration,
    ) -> Result<AircraftRecord, ApiError> {
        let body = self
            .execute(
                Method::POST,
                "/aircrafts",
                Some(session),
                Some(to_body(registration)?),
            )
            .await?;
        decode(&body)
    }

    async fn submit_fuel_request(
        &self,
        session: &Session,
        payload: &FuelRequestPayload,
    ) -> Result<(), ApiError> {
        self.execute(
            Method::POST,
            "/fuel-requests",
            Some(session),
            Some(to_body(payload)?),
        )
        .await?;
        Ok(())
    }

    fn stats(&self) -> ClientStats {
        self.stats.lock().clone()
    }
}

impl HttpMarketplaceClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.timeout_ms));
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }

        let http = builder
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        Ok(Self {
            http,
            config,
            stats: Arc::new(Mutex::new(ClientStats::default())),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // Helper to calculate exponential backoff with jitter
    pub fn calculate_backoff(retry_attempt: u32, config: &RetryConfig) -> Duration {
        let base_backoff_ms = (config.initial_backoff_ms as f64
            * config.backoff_multiplier.powf(retry_attempt as f64))
        .min(config.max_backoff_ms as f64);

        let jitter = rand::random::<f64>() * config.jitter_factor * base_backoff_ms;
        let backoff_ms = base_backoff_ms * (1.0 - config.jitter_factor / 2.0) + jitter;

        Duration::from_millis(backoff_ms as u64)
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    // GETs are idempotent, so transient failures are retried with backoff
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        session: Option<&Session>,
    ) -> Result<T, ApiError> {
        let retry = &self.config.retry_config;
        let mut attempt = 0;

        loop {
            match self.execute(Method::GET, path, session, None).await {
                Ok(body) => return decode(&body),
                Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                    let backoff = Self::calculate_backoff(attempt, retry);
                    warn!(
                        path,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "retrying request"
                    );
                    self.stats.lock().requests_retried += 1;
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        session: Option<&Session>,
        body: Option<serde_json::Value>,
    ) -> Result<String, ApiError> {
        let started = Instant::now();
        let result = self.send_once(method.clone(), path, session, body).await;
        self.stats.lock().record(started.elapsed(), result.is_ok());

        match &result {
            Ok(_) => debug!(%method, path, elapsed_ms = started.elapsed().as_millis() as u64, "request succeeded"),
            Err(ApiError::Unauthorized(message)) => {
                warn!(%method, path, message = message.as_str(), "request unauthorized");
            }
            Err(e) => debug!(%method, path, error = %e, "request failed"),
        }

        result
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        session: Option<&Session>,
        body: Option<serde_json::Value>,
    ) -> Result<String, ApiError> {
        let mut request = self.http.request(method, self.url(path));
        if let Some(session) = session {
            request = request.bearer_auth(session.token().as_str());
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(status_error(status, &text));
        }
        Ok(text)
    }

    fn transport_error(&self, error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout(self.config.timeout_ms)
        } else {
            ApiError::NetworkError(error.to_string())
        }
    }
}

fn status_error(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });

    if status == StatusCode::UNAUTHORIZED {
        return ApiError::Unauthorized(message);
    }

    ApiError::ApiResponseError {
        status_code: status.as_u16(),
        message,
        is_retryable: status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
    }
}

fn to_body<T: serde::Serialize + ?Sized>(value: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))
}

// In-memory stand-in for the backend, used by workflow tests
#[cfg(test)]
pub(crate) mod mock_api {
    use super::*;
    use std::collections::{HashMap, HashSet};

    #[derive(Default)]
    struct MockState {
        login: Option<LoginResponse>,
        suppliers: Vec<SupplierRecord>,
        aircraft_types: Vec<AircraftType>,
        customer_aircraft: Vec<RegisteredAircraft>,
        failing: HashSet<&'static str>,
        calls: HashMap<&'static str, usize>,
        tokens: Vec<String>,
        registrations: Vec<AircraftRegistration>,
        fuel_requests: Vec<FuelRequestPayload>,
    }

    #[derive(Default)]
    pub struct MockApi {
        state: Mutex<MockState>,
    }

    impl MockApi {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_login(&self, response: LoginResponse) {
            self.state.lock().login = Some(response);
        }

        pub fn set_suppliers(&self, suppliers: Vec<SupplierRecord>) {
            self.state.lock().suppliers = suppliers;
        }

        pub fn set_aircraft_types(&self, types: Vec<AircraftType>) {
            self.state.lock().aircraft_types = types;
        }

        pub fn set_customer_aircraft(&self, aircraft: Vec<RegisteredAircraft>) {
            self.state.lock().customer_aircraft = aircraft;
        }

        pub fn fail(&self, operation: &'static str) {
            self.state.lock().failing.insert(operation);
        }

        pub fn calls(&self, operation: &str) -> usize {
            self.state.lock().calls.get(operation).copied().unwrap_or(0)
        }

        pub fn last_token(&self) -> Option<String> {
            self.state.lock().tokens.last().cloned()
        }

        pub fn registrations(&self) -> Vec<AircraftRegistration> {
            self.state.lock().registrations.clone()
        }

        pub fn fuel_requests(&self) -> Vec<FuelRequestPayload> {
            self.state.lock().fuel_requests.clone()
        }

        fn record(&self, operation: &'static str, session: Option<&Session>) -> Result<(), ApiError> {
            let mut state = self.state.lock();
            *state.calls.entry(operation).or_insert(0) += 1;
            if let Some(session) = session {
                state.tokens.push(session.token().as_str().to_string());
            }
            if state.failing.contains(operation) {
                return Err(ApiError::NetworkError("connection refused".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MarketplaceApi for MockApi {
        async fn login(&self, _credentials: &Credentials) -> Result<LoginResponse, ApiError> {
            self.record("login", None)?;
            self.state
                .lock()
                .login
                .clone()
                .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))
        }

        async fn list_suppliers(
            &self,
            session: &Session,
        ) -> Result<Vec<SupplierRecord>, ApiError> {
            self.record("list_suppliers", Some(session))?;
            Ok(self.state.lock().suppliers.clone())
        }

        async fn supplier(
            &self,
            session: &Session,
            supplier_id: u64,
        ) -> Result<SupplierRecord, ApiError> {
            self.record("supplier", Some(session))?;
            self.state
                .lock()
                .suppliers
                .iter()
                .find(|s| s.id == supplier_id)
                .cloned()
                .ok_or_else(|| ApiError::ApiResponseError {
                    status_code: 404,
                    message: "Supplier not found".to_string(),
                    is_retryable: false,
                })
        }

        async fn aircraft_types(&self) -> Result<Vec<AircraftType>, ApiError> {
            self.record("aircraft_types", None)?;
            Ok(self.state.lock().aircraft_types.clone())
        }

        async fn customer_aircraft(
            &self,
            session: &Session,
            _customer_id: u64,
        ) -> Result<Vec<RegisteredAircraft>, ApiError> {
            self.record("customer_aircraft", Some(session))?;
            Ok(self.state.lock().customer_aircraft.clone())
        }

        async fn register_aircraft(
            &self,
            session: &Session,
            registration: &AircraftRegistration,
        ) -> Result<AircraftRecord, ApiError> {
            self.record("register_aircraft", Some(session))?;
            let mut state = self.state.lock();
            state.registrations.push(registration.clone());
            Ok(AircraftRecord {
                id: 100 + state.registrations.len() as u64,
                prefix: registration.prefix.clone(),
                registration_number: registration.registration_number.clone(),
                aircraft_type_id: registration.aircraft_type_id,
            })
        }

        async fn submit_fuel_request(
            &self,
            session: &Session,
            payload: &FuelRequestPayload,
        ) -> Result<(), ApiError> {
            self.record("submit_fuel_request", Some(session))?;
            self.state.lock().fuel_requests.push(payload.clone());
            Ok(())
        }

        fn stats(&self) -> ClientStats {
            ClientStats::default()
        }
    }
}
