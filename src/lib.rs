// Customer-side client for the aviation fuel-supplier marketplace

pub mod client;
pub mod dashboard;
pub mod fuel_request;
pub mod offer;
pub mod session;
pub mod supplier;

// Re-export key types for convenience
pub use client::{
    ApiError, ClientConfig, ClientError, ClientStats, HttpMarketplaceClient, MarketplaceApi,
    RetryConfig,
};
pub use dashboard::{Dashboard, DashboardError, SearchResults, SupplierDetails};
pub use fuel_request::{
    AircraftChoice, AircraftOptions, AircraftType, FlightLeg, FuelRequestDraft, FuelRequestError,
    FuelRequestPayload, NewAircraft, RegisteredAircraft,
};
pub use offer::{resolve_offers, Offer, SearchRequest, SearchRequestError, ViewerPolicy};
pub use session::{sign_in, Credentials, Session, SessionError, SignInError};
pub use supplier::{AirportRecord, ContactPerson, CountryRecord, PriceRecord, SupplierRecord};
