use std::sync::Arc;

use anyhow::{anyhow, Context};
use chrono::{NaiveDate, NaiveTime};
use clap::ArgAction;
use fuel_desk::fuel_request::{load_aircraft_options, register_new_aircraft, submit_fuel_request};
use fuel_desk::{
    sign_in, AircraftChoice, ClientConfig, Credentials, Dashboard, FlightLeg, FuelRequestDraft,
    HttpMarketplaceClient, MarketplaceApi, NewAircraft, Offer, Session,
};
use tracing::debug;

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| format!("expected HH:MM, got {s:?}"))
}

#[derive(Debug, clap::Parser)]
#[command(version, about = "Search fuel suppliers and request fuel from the marketplace")]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Customer account email
    #[arg(long, env = "FUEL_DESK_EMAIL", global = true, default_value = "")]
    email: String,

    /// Customer account password
    #[arg(long, env = "FUEL_DESK_PASSWORD", global = true, default_value = "", hide_env_values = true)]
    password: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Search suppliers serving a country
    Search {
        #[arg(long)]
        country: String,

        /// Only show prices valid on this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Show a supplier's airports and prices for a country
    Supplier {
        id: u64,

        #[arg(long)]
        country: String,
    },

    /// List aircraft types and the aircraft on your account
    Aircraft,

    /// Register a new aircraft on your account
    RegisterAircraft {
        #[arg(long)]
        type_id: u64,

        #[arg(long)]
        prefix: String,

        #[arg(long)]
        number: String,

        #[arg(long)]
        registered_country: Option<String>,
    },

    /// Submit a fuel request
    RequestFuel(RequestFuel),
}

#[derive(Debug, clap::Args)]
pub struct RequestFuel {
    #[arg(long)]
    operator: String,

    /// Use an aircraft already on your account
    #[arg(long, conflicts_with_all = ["type_id", "prefix", "number"])]
    aircraft_id: Option<u64>,

    /// Aircraft type for an unregistered aircraft
    #[arg(long)]
    type_id: Option<u64>,

    #[arg(long)]
    prefix: Option<String>,

    #[arg(long)]
    number: Option<String>,

    #[arg(long)]
    from: String,

    #[arg(long)]
    departure_date: NaiveDate,

    #[arg(long, value_parser = parse_time)]
    departure_time: NaiveTime,

    #[arg(long)]
    to: String,

    #[arg(long)]
    arrival_date: NaiveDate,

    #[arg(long, value_parser = parse_time)]
    arrival_time: NaiveTime,

    #[arg(long)]
    fuel_type: String,

    #[arg(long)]
    quantity: f64,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let config = ClientConfig::from_env()?;
        debug!(base_url = config.base_url.as_str(), "using marketplace backend");
        let api = Arc::new(HttpMarketplaceClient::new(config)?);

        let credentials = Credentials::new(self.email, self.password);
        let session = sign_in(api.as_ref(), &credentials).await?;
        let dashboard = Dashboard::new(api);

        self.command.run(&dashboard, &session).await
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

impl Command {
    async fn run(
        self,
        dashboard: &Dashboard<HttpMarketplaceClient>,
        session: &Session,
    ) -> anyhow::Result<()> {
        match self {
            Command::Search { country, date } => {
                let results = dashboard.search(session, &country, date.as_deref()).await?;
                println!("{} results found", results.len());
                if results.is_empty() {
                    println!("No suppliers found for your search criteria.");
                }
                for offer in &results.offers {
                    print_offer(offer);
                }
            }
            Command::Supplier { id, country } => {
                let details = dashboard.supplier_details(session, id, &country).await?;
                println!("{} (#{})", details.supplier_name, details.supplier_id);

                if details.contact_persons.is_empty() {
                    println!("No contact persons available.");
                }
                for contact in &details.contact_persons {
                    let reach = [contact.email.as_deref(), contact.phone.as_deref()]
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>()
                        .join(", ");
                    println!("  contact: {} {}", contact.name, reach);
                }

                let Some(country) = details.selected_country else {
                    println!("No airports available for this country.");
                    return Ok(());
                };
                println!("Airports in {}", country.country_name);
                for airport in &country.airports {
                    println!("  {}", airport.airport_name);
                    if airport.prices.is_empty() {
                        println!("    no prices listed");
                    }
                    for price in &airport.prices {
                        println!(
                            "    base {:.2} | hook-up {} | low fuel {} | uplift {} | other {} | {}",
                            price.base_fare,
                            amount(price.hook_up_fee),
                            amount(price.low_fuel_cost),
                            amount(price.uplift),
                            amount(price.other_cost),
                            validity(price.valid_from, price.valid_to),
                        );
                    }
                }
            }
            Command::Aircraft => {
                let options = load_aircraft_options(dashboard.api(), session).await;
                println!("Aircraft types:");
                for aircraft_type in &options.aircraft_types {
                    println!("  [{}] {}", aircraft_type.id, aircraft_type.label());
                }
                println!("Your aircraft:");
                if options.registered.is_empty() {
                    println!("  none registered");
                }
                for aircraft in &options.registered {
                    println!("  [{}] {}", aircraft.id, aircraft.label());
                }
            }
            Command::RegisterAircraft {
                type_id,
                prefix,
                number,
                registered_country,
            } => {
                let catalog = dashboard
                    .api()
                    .aircraft_types()
                    .await
                    .context("failed to fetch aircraft types")?;
                let aircraft = NewAircraft {
                    aircraft_type_id: Some(type_id),
                    prefix,
                    number,
                    registered_country,
                };
                let added =
                    register_new_aircraft(dashboard.api(), session, &aircraft, &catalog).await?;
                println!("Registered [{}] {}", added.id, added.label());
            }
            Command::RequestFuel(request) => request.run(dashboard, session).await?,
        }

        Ok(())
    }
}

impl RequestFuel {
    async fn run(
        self,
        dashboard: &Dashboard<HttpMarketplaceClient>,
        session: &Session,
    ) -> anyhow::Result<()> {
        let aircraft = match self.aircraft_id {
            Some(aircraft_id) => {
                let options = load_aircraft_options(dashboard.api(), session).await;
                let registered = options
                    .find_registered(aircraft_id)
                    .cloned()
                    .ok_or_else(|| anyhow!("aircraft {aircraft_id} is not on your account"))?;
                AircraftChoice::Registered(registered)
            }
            None => AircraftChoice::New(NewAircraft {
                aircraft_type_id: self.type_id,
                prefix: self.prefix.unwrap_or_default(),
                number: self.number.unwrap_or_default(),
                registered_country: None,
            }),
        };

        let draft = FuelRequestDraft {
            operator_name: self.operator,
            aircraft,
            departure: FlightLeg {
                airport: self.from,
                date: self.departure_date,
                time: self.departure_time,
            },
            arrival: FlightLeg {
                airport: self.to,
                date: self.arrival_date,
                time: self.arrival_time,
            },
            fuel_type: self.fuel_type,
            fuel_quantity: self.quantity,
        };

        let payload = submit_fuel_request(dashboard.api(), session, draft).await?;
        println!(
            "Fuel request submitted: {} {} from {} to {}",
            payload.quantity, payload.fuel_type, payload.departure_location, payload.arrival_location
        );
        Ok(())
    }
}

fn print_offer(offer: &Offer) {
    println!(
        "#{} {} [{}] {}, {}  {:.2}  {}",
        offer.supplier_id,
        offer.supplier_name,
        availability(offer),
        offer.airport,
        offer.country,
        offer.base_fare,
        validity(offer.valid_from, offer.valid_to),
    );
}

fn availability(offer: &Offer) -> &'static str {
    if offer.is_active() {
        "Available"
    } else {
        "Unavailable"
    }
}

fn amount(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

fn validity(from: NaiveDate, to: Option<NaiveDate>) -> String {
    match to {
        Some(to) => format!("valid {from} to {to}"),
        None => format!("valid from {from}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::Parser;

    const FUEL_ARGS: [&str; 18] = [
        "--operator",
        "Serendib Air",
        "--from",
        "VCBI",
        "--departure-date",
        "2024-06-01",
        "--departure-time",
        "08:30",
        "--to",
        "VRMM",
        "--arrival-date",
        "2024-06-01",
        "--arrival-time",
        "10:05:30",
        "--fuel-type",
        "Jet A-1",
        "--quantity",
        "1200",
    ];

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn request_fuel(extra: &[&str]) -> Result<Cli, clap::Error> {
        let args = ["fuel-desk", "request-fuel"]
            .into_iter()
            .chain(extra.iter().copied())
            .chain(FUEL_ARGS);
        Cli::try_parse_from(args)
    }

    #[test]
    fn test_search_command_parses_country_and_date() {
        let cli = Cli::try_parse_from([
            "fuel-desk",
            "search",
            "--country",
            "Sri Lanka",
            "--date",
            "2024-06-01",
        ])
        .unwrap();

        match cli.command {
            Command::Search { country, date } => {
                assert_eq!(country, "Sri Lanka");
                assert_eq!(date.as_deref(), Some("2024-06-01"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_search_requires_country() {
        let err = Cli::try_parse_from(["fuel-desk", "search"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_request_fuel_with_registered_aircraft() {
        let cli = request_fuel(&["--aircraft-id", "5"]).unwrap();

        let Command::RequestFuel(request) = cli.command else {
            panic!("expected request-fuel");
        };
        assert_eq!(request.aircraft_id, Some(5));
        assert_eq!(request.departure_date, date("2024-06-01"));
        assert_eq!(request.departure_time, NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(request.arrival_time, NaiveTime::from_hms_opt(10, 5, 30).unwrap());
        assert_eq!(request.quantity, 1200.0);
    }

    #[test]
    fn test_request_fuel_rejects_aircraft_id_with_new_aircraft_fields() {
        let err = request_fuel(&["--aircraft-id", "5", "--prefix", "4R"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);

        let err = request_fuel(&["--aircraft-id", "5", "--type-id", "3"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_request_fuel_accepts_new_aircraft_fields() {
        let cli = request_fuel(&["--type-id", "3", "--prefix", "4R", "--number", "ABC"]).unwrap();

        let Command::RequestFuel(request) = cli.command else {
            panic!("expected request-fuel");
        };
        assert_eq!(request.aircraft_id, None);
        assert_eq!(request.type_id, Some(3));
        assert_eq!(request.prefix.as_deref(), Some("4R"));
        assert_eq!(request.number.as_deref(), Some("ABC"));
    }

    #[test]
    fn test_parse_time_accepts_minutes_and_seconds() {
        assert_eq!(parse_time("08:30"), Ok(NaiveTime::from_hms_opt(8, 30, 0).unwrap()));
        assert_eq!(parse_time("23:59:15"), Ok(NaiveTime::from_hms_opt(23, 59, 15).unwrap()));
        assert!(parse_time("8.30am").is_err());
        assert!(parse_time("25:00").is_err());
    }

    #[test]
    fn test_amount_formatting() {
        assert_eq!(amount(None), "-");
        assert_eq!(amount(Some(15.0)), "15.00");
    }

    #[test]
    fn test_validity_formatting() {
        assert_eq!(
            validity(date("2024-01-01"), Some(date("2024-12-31"))),
            "valid 2024-01-01 to 2024-12-31"
        );
        assert_eq!(validity(date("2024-01-01"), None), "valid from 2024-01-01");
    }

    #[test]
    fn test_availability_follows_supplier_status() {
        let mut offer = Offer {
            supplier_id: 1,
            supplier_name: "Lanka Jet Fuel".to_string(),
            status: " Active ".to_string(),
            country: "Sri Lanka".to_string(),
            airport: "CMB".to_string(),
            base_fare: 80.0,
            valid_from: date("2024-01-01"),
            valid_to: None,
        };
        assert_eq!(availability(&offer), "Available");

        offer.status = "inactive".to_string();
        assert_eq!(availability(&offer), "Unavailable");
    }
}
