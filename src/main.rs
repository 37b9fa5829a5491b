use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the real environment still applies
    dotenv::dotenv().ok();

    cli::Cli::parse().run().await
}
