// Customer dashboard workflows: supplier search and supplier details
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::client::{ApiError, MarketplaceApi};
use crate::offer::{
    cheapest, resolve_offers, Offer, SearchRequest, SearchRequestError, ViewerPolicy,
};
use crate::session::Session;
use crate::supplier::{ContactPerson, CountryRecord};

#[derive(Error, Debug, PartialEq)]
pub enum DashboardError {
    #[error(transparent)]
    InvalidSearch(#[from] SearchRequestError),

    #[error("Failed to fetch supplier data: {0}")]
    Fetch(#[from] ApiError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    pub request: SearchRequest,
    pub policy: ViewerPolicy,
    pub offers: Vec<Offer>,
}

impl SearchResults {
    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    pub fn cheapest(&self) -> Option<&Offer> {
        cheapest(&self.offers)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupplierDetails {
    pub supplier_id: u64,
    pub supplier_name: String,
    pub status: String,
    pub contact_persons: Vec<ContactPerson>,
    pub selected_country: Option<CountryRecord>,
}

pub struct Dashboard<A: MarketplaceApi + ?Sized> {
    api: Arc<A>,
}

impl<A: MarketplaceApi + ?Sized> Clone for Dashboard<A> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
        }
    }
}

impl<A: MarketplaceApi + ?Sized> Dashboard<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Runs one search: validates the form input, fetches the supplier list
    /// and resolves it under the session's viewer policy. An empty result is
    /// `Ok`; only a failed fetch is an error.
    #[instrument(skip(self, session), fields(customer_id = session.customer_id()))]
    pub async fn search(
        &self,
        session: &Session,
        country: &str,
        reference_date: Option<&str>,
    ) -> Result<SearchResults, DashboardError> {
        let request = SearchRequest::parse(country, reference_date)?;
        self.search_with(session, request).await
    }

    pub async fn search_with(
        &self,
        session: &Session,
        request: SearchRequest,
    ) -> Result<SearchResults, DashboardError> {
        let suppliers = self.api.list_suppliers(session).await.map_err(|e| {
            warn!(error = %e, "supplier fetch failed");
            e
        })?;

        let policy = session.viewer_policy();
        let offers = resolve_offers(&suppliers, &request, policy);
        info!(
            country = request.country_name.trim(),
            suppliers = suppliers.len(),
            offers = offers.len(),
            all_offers = policy.can_view_all_offers,
            "search resolved"
        );

        Ok(SearchResults {
            request,
            policy,
            offers,
        })
    }

    // Supplier page for the country the customer searched
    #[instrument(skip(self, session))]
    pub async fn supplier_details(
        &self,
        session: &Session,
        supplier_id: u64,
        country: &str,
    ) -> Result<SupplierDetails, DashboardError> {
        let supplier = self.api.supplier(session, supplier_id).await?;
        let selected_country = supplier.country(country).cloned();

        if selected_country.is_none() {
            info!(supplier_id, "supplier has no record for the searched country");
        }

        Ok(SupplierDetails {
            supplier_id: supplier.id,
            supplier_name: supplier.supplier_name,
            status: supplier.status,
            contact_persons: supplier.contact_persons,
            selected_country,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock_api::MockApi;
    use crate::session::{BearerToken, UserRecord};
    use crate::supplier::{AirportRecord, PriceRecord, SupplierRecord};
    use chrono::NaiveDate;
    use tokio_test::{assert_err, assert_ok};

    fn session(can_view_all_offers: bool) -> Session {
        Session::new(
            BearerToken::new("customer-token"),
            UserRecord {
                id: 8,
                name: "Tharindu".to_string(),
                email: "tharindu@example.com".to_string(),
                role: "user".to_string(),
                can_view_all_offers,
            },
        )
    }

    fn suppliers() -> Vec<SupplierRecord> {
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        vec![SupplierRecord {
            id: 1,
            supplier_name: "Lanka Jet Fuel".to_string(),
            status: "active".to_string(),
            countries: vec![CountryRecord {
                country_name: "Sri Lanka".to_string(),
                airports: vec![
                    AirportRecord {
                        airport_name: "CMB".to_string(),
                        prices: vec![PriceRecord::new(100.0, from, None)],
                    },
                    AirportRecord {
                        airport_name: "JAF".to_string(),
                        prices: vec![PriceRecord::new(80.0, from, None)],
                    },
                ],
            }],
            contact_persons: vec![ContactPerson {
                name: "Ops Desk".to_string(),
                email: Some("ops@lankajet.example".to_string()),
                phone: None,
            }],
        }]
    }

    fn dashboard() -> (Dashboard<MockApi>, Arc<MockApi>) {
        let api = Arc::new(MockApi::new());
        api.set_suppliers(suppliers());
        (Dashboard::new(api.clone()), api)
    }

    #[tokio::test]
    async fn test_search_applies_session_policy() {
        let (dashboard, api) = dashboard();

        let restricted = assert_ok!(
            dashboard
                .search(&session(false), "Sri Lanka", Some("2024-06-01"))
                .await
        );
        assert_eq!(restricted.len(), 1);
        assert_eq!(restricted.offers[0].airport, "JAF");
        assert_eq!(restricted.policy, ViewerPolicy::restricted());

        let full = assert_ok!(dashboard.search(&session(true), " sri lanka ", None).await);
        assert_eq!(full.len(), 2);
        assert_eq!(full.cheapest().map(|o| o.airport.as_str()), Some("JAF"));

        assert_eq!(api.calls("list_suppliers"), 2);
        assert_eq!(api.last_token().as_deref(), Some("customer-token"));
    }

    #[tokio::test]
    async fn test_blank_country_is_rejected_before_fetching() {
        let (dashboard, api) = dashboard();

        let err = assert_err!(dashboard.search(&session(false), "  ", None).await);
        assert_eq!(
            err,
            DashboardError::InvalidSearch(SearchRequestError::MissingCountry)
        );
        assert_eq!(err.to_string(), "Please enter a country");
        assert_eq!(api.calls("list_suppliers"), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_distinct_from_no_matches() {
        let (dashboard, api) = dashboard();

        let empty = assert_ok!(dashboard.search(&session(true), "Peru", None).await);
        assert!(empty.is_empty());

        api.fail("list_suppliers");
        let err = assert_err!(dashboard.search(&session(true), "Sri Lanka", None).await);
        assert!(matches!(err, DashboardError::Fetch(ApiError::NetworkError(_))));
        assert_eq!(
            err.to_string(),
            "Failed to fetch supplier data: Network error: connection refused"
        );
    }

    #[tokio::test]
    async fn test_supplier_details_selects_searched_country() {
        let (dashboard, _api) = dashboard();

        let details = assert_ok!(
            dashboard
                .supplier_details(&session(false), 1, "SRI LANKA")
                .await
        );
        assert_eq!(details.supplier_name, "Lanka Jet Fuel");
        assert_eq!(details.contact_persons.len(), 1);
        let country = details.selected_country.unwrap();
        assert_eq!(country.airports.len(), 2);

        let elsewhere = assert_ok!(dashboard.supplier_details(&session(false), 1, "India").await);
        assert!(elsewhere.selected_country.is_none());
    }

    #[tokio::test]
    async fn test_supplier_details_for_unknown_supplier() {
        let (dashboard, _api) = dashboard();

        let err = assert_err!(dashboard.supplier_details(&session(false), 404, "Sri Lanka").await);
        assert_eq!(
            err.to_string(),
            "Failed to fetch supplier data: API error: 404 - Supplier not found"
        );
        assert!(matches!(
            err,
            DashboardError::Fetch(ApiError::ApiResponseError {
                status_code: 404,
                ..
            })
        ));
    }
}
