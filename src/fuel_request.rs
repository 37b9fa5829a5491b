// Aircraft registration and fuel request submission
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::client::{ApiError, MarketplaceApi};
use crate::session::Session;

// Registry country used when the customer does not pick one
pub const DEFAULT_REGISTERED_COUNTRY: &str = "US";

#[derive(Error, Debug, PartialEq)]
pub enum FuelRequestError {
    #[error("Fill all aircraft details")]
    IncompleteAircraft,

    #[error("Please select a valid aircraft type")]
    UnknownAircraftType(u64),

    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    #[error("Fuel quantity must be greater than zero")]
    InvalidQuantity,

    #[error("Arrival {arrival} is before departure {departure}")]
    ArrivalBeforeDeparture {
        departure: NaiveDateTime,
        arrival: NaiveDateTime,
    },

    #[error("{0}")]
    Api(#[from] ApiError),
}

// Entry in the aircraft type catalog
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AircraftType {
    #[serde(rename = "aircraftTypeId", alias = "id")]
    pub id: u64,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub model_name: String,
}

impl AircraftType {
    pub fn label(&self) -> String {
        format!("{} - {}", self.manufacturer, self.model_name)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AircraftTypeRef {
    pub id: u64,
    #[serde(default)]
    pub model_name: String,
}

// An aircraft already on the customer's account
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RegisteredAircraft {
    pub id: u64,
    pub prefix: String,
    pub registration_number: String,
    #[serde(rename = "aircraftType")]
    pub aircraft_type: AircraftTypeRef,
}

impl RegisteredAircraft {
    pub fn label(&self) -> String {
        format!(
            "{}-{} ({})",
            self.prefix, self.registration_number, self.aircraft_type.model_name
        )
    }
}

// Backend's answer to a new registration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AircraftRecord {
    pub id: u64,
    pub prefix: String,
    pub registration_number: String,
    #[serde(rename = "aircraftTypeId")]
    pub aircraft_type_id: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewAircraft {
    pub aircraft_type_id: Option<u64>,
    pub prefix: String,
    pub number: String,
    pub registered_country: Option<String>,
}

impl NewAircraft {
    fn check_complete(&self) -> Result<u64, FuelRequestError> {
        match self.aircraft_type_id {
            Some(type_id) if !self.prefix.trim().is_empty() && !self.number.trim().is_empty() => {
                Ok(type_id)
            }
            _ => Err(FuelRequestError::IncompleteAircraft),
        }
    }

    fn registered_country(&self) -> String {
        self.registered_country
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_REGISTERED_COUNTRY)
            .to_string()
    }

    /// Builds the registration body, resolving manufacturer and model from
    /// the type catalog. Prefix and number are uppercased.
    pub fn registration(
        &self,
        customer_id: u64,
        catalog: &[AircraftType],
    ) -> Result<AircraftRegistration, FuelRequestError> {
        let type_id = self.check_complete()?;
        let aircraft_type = catalog
            .iter()
            .find(|t| t.id == type_id)
            .ok_or(FuelRequestError::UnknownAircraftType(type_id))?;

        Ok(AircraftRegistration {
            customer_id,
            aircraft_type_id: type_id,
            manufacturer: aircraft_type.manufacturer.clone(),
            model_name: aircraft_type.model_name.clone(),
            registration_number: self.number.trim().to_uppercase(),
            prefix: self.prefix.trim().to_uppercase(),
            registered_country: self.registered_country(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AircraftRegistration {
    #[serde(rename = "customerId")]
    pub customer_id: u64,
    #[serde(rename = "aircraftTypeId")]
    pub aircraft_type_id: u64,
    pub manufacturer: String,
    pub model_name: String,
    pub registration_number: String,
    pub prefix: String,
    pub registered_country: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AircraftChoice {
    Registered(RegisteredAircraft),
    New(NewAircraft),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlightLeg {
    pub airport: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl FlightLeg {
    fn at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuelRequestDraft {
    pub operator_name: String,
    pub aircraft: AircraftChoice,
    pub departure: FlightLeg,
    pub arrival: FlightLeg,
    pub fuel_type: String,
    pub fuel_quantity: f64,
}

// Wire body for POST /fuel-requests
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelRequestPayload {
    pub customer_id: u64,
    pub operator_name: String,
    pub aircraft_id: Option<u64>,
    pub aircraft_type_id: u64,
    #[serde(rename = "registration_number")]
    pub registration_number: Option<String>,
    pub prefix: Option<String>,
    #[serde(rename = "registered_country")]
    pub registered_country: Option<String>,
    pub fuel_type: String,
    pub quantity: f64,
    pub departure_location: String,
    pub departure_date: NaiveDate,
    #[serde(serialize_with = "serialize_time")]
    pub departure_time: NaiveTime,
    pub arrival_location: String,
    pub arrival_date: NaiveDate,
    #[serde(serialize_with = "serialize_time")]
    pub arrival_time: NaiveTime,
}

// Times go out as HH:MM, the way the booking form captures them
fn serialize_time<S: serde::Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.format("%H:%M").to_string())
}

fn required(value: &str, field: &'static str) -> Result<String, FuelRequestError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FuelRequestError::MissingRequiredField(field));
    }
    Ok(value.to_string())
}

impl FuelRequestDraft {
    pub fn into_payload(self, customer_id: u64) -> Result<FuelRequestPayload, FuelRequestError> {
        let operator_name = required(&self.operator_name, "operatorName")?;
        let fuel_type = required(&self.fuel_type, "fuelType")?;
        let departure_location = required(&self.departure.airport, "departureLocation")?;
        let arrival_location = required(&self.arrival.airport, "arrivalLocation")?;

        if !(self.fuel_quantity > 0.0) {
            return Err(FuelRequestError::InvalidQuantity);
        }
        if self.arrival.at() < self.departure.at() {
            return Err(FuelRequestError::ArrivalBeforeDeparture {
                departure: self.departure.at(),
                arrival: self.arrival.at(),
            });
        }

        let (aircraft_id, aircraft_type_id, registration_number, prefix, registered_country) =
            match &self.aircraft {
                AircraftChoice::Registered(aircraft) => {
                    (Some(aircraft.id), aircraft.aircraft_type.id, None, None, None)
                }
                AircraftChoice::New(aircraft) => {
                    let type_id = aircraft.check_complete()?;
                    (
                        None,
                        type_id,
                        Some(aircraft.number.trim().to_uppercase()),
                        Some(aircraft.prefix.trim().to_uppercase()),
                        Some(aircraft.registered_country()),
                    )
                }
            };

        Ok(FuelRequestPayload {
            customer_id,
            operator_name,
            aircraft_id,
            aircraft_type_id,
            registration_number,
            prefix,
            registered_country,
            fuel_type,
            quantity: self.fuel_quantity,
            departure_location: departure_location.to_uppercase(),
            departure_date: self.departure.date,
            departure_time: self.departure.time,
            arrival_location: arrival_location.to_uppercase(),
            arrival_date: self.arrival.date,
            arrival_time: self.arrival.time,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AircraftOptions {
    pub aircraft_types: Vec<AircraftType>,
    pub registered: Vec<RegisteredAircraft>,
}

impl AircraftOptions {
    pub fn find_registered(&self, aircraft_id: u64) -> Option<&RegisteredAircraft> {
        self.registered.iter().find(|a| a.id == aircraft_id)
    }
}

/// Fetches the type catalog and the customer's aircraft concurrently. Either
/// side failing is logged and leaves that list empty.
pub async fn load_aircraft_options<A>(api: &A, session: &Session) -> AircraftOptions
where
    A: MarketplaceApi + ?Sized,
{
    let (types, registered) = futures::join!(
        api.aircraft_types(),
        api.customer_aircraft(session, session.customer_id())
    );

    let aircraft_types = types.unwrap_or_else(|e| {
        warn!(error = %e, "failed to fetch aircraft types");
        Vec::new()
    });
    let registered = registered.unwrap_or_else(|e| {
        warn!(customer_id = session.customer_id(), error = %e, "failed to fetch customer aircraft");
        Vec::new()
    });

    AircraftOptions {
        aircraft_types,
        registered,
    }
}

pub async fn register_new_aircraft<A>(
    api: &A,
    session: &Session,
    aircraft: &NewAircraft,
    catalog: &[AircraftType],
) -> Result<RegisteredAircraft, FuelRequestError>
where
    A: MarketplaceApi + ?Sized,
{
    let registration = aircraft.registration(session.customer_id(), catalog)?;
    let record = api.register_aircraft(session, &registration).await?;

    info!(
        aircraft_id = record.id,
        prefix = record.prefix.as_str(),
        number = record.registration_number.as_str(),
        "registered aircraft"
    );

    Ok(RegisteredAircraft {
        id: record.id,
        prefix: record.prefix,
        registration_number: record.registration_number,
        aircraft_type: AircraftTypeRef {
            id: record.aircraft_type_id,
            model_name: registration.model_name,
        },
    })
}

pub async fn submit_fuel_request<A>(
    api: &A,
    session: &Session,
    draft: FuelRequestDraft,
) -> Result<FuelRequestPayload, FuelRequestError>
where
    A: MarketplaceApi + ?Sized,
{
    let payload = draft.into_payload(session.customer_id())?;
    api.submit_fuel_request(session, &payload).await?;

    info!(
        customer_id = payload.customer_id,
        departure = payload.departure_location.as_str(),
        arrival = payload.arrival_location.as_str(),
        quantity = payload.quantity,
        "fuel request submitted"
    );
    Ok(payload)
}
