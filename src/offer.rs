// Offer resolution: turns the backend's nested supplier records into the flat
// list of offers shown for a searched country.
use std::borrow::Borrow;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::supplier::{is_active_status, normalize_country, SupplierRecord};

#[derive(Error, Debug, PartialEq)]
pub enum SearchRequestError {
    #[error("Please enter a country")]
    MissingCountry,

    #[error("Invalid reference date: {0}")]
    InvalidDate(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub country_name: String,
    pub reference_date: Option<NaiveDate>,
}

impl SearchRequest {
    pub fn new(country_name: impl Into<String>, reference_date: Option<NaiveDate>) -> Self {
        Self {
            country_name: country_name.into(),
            reference_date,
        }
    }

    // Build a request from raw form input. An empty date means "any date".
    pub fn parse(
        country_name: &str,
        reference_date: Option<&str>,
    ) -> Result<Self, SearchRequestError> {
        if country_name.trim().is_empty() {
            return Err(SearchRequestError::MissingCountry);
        }

        let reference_date = match reference_date.map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| SearchRequestError::InvalidDate(raw.to_string()))?,
            ),
        };

        Ok(Self::new(country_name, reference_date))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewerPolicy {
    pub can_view_all_offers: bool,
}

impl ViewerPolicy {
    pub fn full() -> Self {
        Self {
            can_view_all_offers: true,
        }
    }

    pub fn restricted() -> Self {
        Self {
            can_view_all_offers: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub supplier_id: u64,
    pub supplier_name: String,
    pub status: String,
    pub country: String,
    pub airport: String,
    pub base_fare: f64,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
}

impl Offer {
    pub fn is_active(&self) -> bool {
        is_active_status(&self.status)
    }
}

/// Resolves the offers visible for `request`.
///
/// Every price under a matching country is materialized in encounter order
/// (supplier, country, airport, price). With a reference date only prices
/// whose validity window contains it are kept. Viewers without full
/// visibility get at most one offer: the cheapest, first one wins on ties.
pub fn resolve_offers(
    suppliers: &[SupplierRecord],
    request: &SearchRequest,
    policy: ViewerPolicy,
) -> Vec<Offer> {
    let wanted = normalize_country(&request.country_name);
    let mut offers = Vec::new();

    for supplier in suppliers {
        for country in &supplier.countries {
            if !country.matches_normalized(&wanted) {
                continue;
            }

            for airport in &country.airports {
                for price in &airport.prices {
                    if !request
                        .reference_date
                        .map_or(true, |date| price.is_valid_on(date))
                    {
                        continue;
                    }

                    offers.push(Offer {
                        supplier_id: supplier.id,
                        supplier_name: supplier.supplier_name.clone(),
                        status: supplier.status.clone(),
                        country: country.country_name.clone(),
                        airport: airport.airport_name.clone(),
                        base_fare: price.base_fare,
                        valid_from: price.valid_from,
                        valid_to: price.valid_to,
                    });
                }
            }
        }
    }

    if policy.can_view_all_offers {
        return offers;
    }

    cheapest(offers).into_iter().collect()
}

// Strict comparison keeps the earliest offer among equal fares
pub(crate) fn cheapest<T, I>(offers: I) -> Option<T>
where
    T: Borrow<Offer>,
    I: IntoIterator<Item = T>,
{
    offers.into_iter().reduce(|best, offer| {
        if offer.borrow().base_fare < best.borrow().base_fare {
            offer
        } else {
            best
        }
    })
}
