use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

// Data structures for the supplier JSON returned by the marketplace backend.
// Nested collections are optional on the wire and default to empty.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierRecord {
    pub id: u64,
    #[serde(default)]
    pub supplier_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub countries: Vec<CountryRecord>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub contact_persons: Vec<ContactPerson>,
}

impl SupplierRecord {
    pub fn is_active(&self) -> bool {
        is_active_status(&self.status)
    }

    /// First country record whose normalized name equals `country_name`.
    pub fn country(&self, country_name: &str) -> Option<&CountryRecord> {
        let wanted = normalize_country(country_name);
        self.countries.iter().find(|c| c.matches_normalized(&wanted))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactPerson {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CountryRecord {
    pub country_name: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub airports: Vec<AirportRecord>,
}

impl CountryRecord {
    // Exact match after trimming and lower-casing both sides
    pub fn matches(&self, country_name: &str) -> bool {
        self.matches_normalized(&normalize_country(country_name))
    }

    pub(crate) fn matches_normalized(&self, normalized: &str) -> bool {
        normalize_country(&self.country_name) == normalized
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AirportRecord {
    pub airport_name: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub prices: Vec<PriceRecord>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    pub base_fare: f64,
    #[serde(deserialize_with = "deserialize_wire_date")]
    pub valid_from: NaiveDate,
    #[serde(default, deserialize_with = "deserialize_optional_wire_date")]
    pub valid_to: Option<NaiveDate>,

    // Fee breakdown shown on the supplier details view
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_up_fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_fuel_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uplift: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_cost: Option<f64>,
}

impl PriceRecord {
    pub fn new(base_fare: f64, valid_from: NaiveDate, valid_to: Option<NaiveDate>) -> Self {
        Self {
            base_fare,
            valid_from,
            valid_to,
            hook_up_fee: None,
            low_fuel_cost: None,
            uplift: None,
            other_cost: None,
        }
    }

    /// Inclusive containment of `date` in `[valid_from, valid_to]`; a missing
    /// `valid_to` leaves the window open-ended.
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        date >= self.valid_from && self.valid_to.map_or(true, |to| date <= to)
    }
}

pub fn is_active_status(status: &str) -> bool {
    status.trim().eq_ignore_ascii_case("active")
}

pub(crate) fn normalize_country(name: &str) -> String {
    name.trim().to_lowercase()
}

// The backend sends either plain dates or full timestamps
pub(crate) fn parse_wire_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
}

// A collection sent as null reads the same as a missing one
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn deserialize_wire_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_wire_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {raw}")))
}

fn deserialize_optional_wire_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_wire_date(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {raw}"))),
    }
}
