//! `prisgraf`: draws Tibber electricity prices for today or tomorrow in the terminal.

use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use tibber_prisgraf::chart::{render_day, TIME_AXIS_LEGEND};
use tibber_prisgraf::{quarter_hour_series, ApiToken, PriceDay, TibberClient, TibberError};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Overrides the Tibber endpoint, for staging or a local mock.
const ENDPOINT_ENV_VAR: &str = "TIBBER_API_URL";

#[derive(Debug, Parser)]
#[command(name = "prisgraf", version, about = "Viser strømpriser fra Tibber som graf")]
struct Cli {
    /// Vise priser for i dag eller i morgen. Gyldige verdier: idag, imorgen
    #[arg(long, default_value = "idag", value_parser = PriceDay::from_str)]
    prisdag: PriceDay,

    /// Tidsavbrudd for kallet mot Tibber, i sekunder
    #[arg(long, default_value_t = 30, value_name = "SEKUNDER")]
    timeout: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("prisgraf=warn,tibber_prisgraf=warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(chart) => {
            println!("{chart}");
            println!("{TIME_AXIS_LEGEND}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<String, TibberError> {
    let token = ApiToken::from_env()?;

    let mut client = TibberClient::with_timeout(token, Duration::from_secs(cli.timeout))?;
    if let Ok(endpoint) = std::env::var(ENDPOINT_ENV_VAR) {
        info!(%endpoint, "using endpoint override");
        client = client.with_endpoint(endpoint);
    }

    let prices = client.fetch_price_info().await?;
    if let Some(current) = &prices.current {
        info!(total = current.total, starts_at = %current.starts_at, "current price");
    }

    let hours = cli.prisdag.series(&prices);
    if hours.is_empty() {
        warn!(prisdag = %cli.prisdag, "no prices published yet");
    }

    Ok(render_day(&quarter_hour_series(hours), cli.prisdag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_day_is_today() {
        let cli = Cli::try_parse_from(["prisgraf"]).unwrap();

        assert_eq!(cli.prisdag, PriceDay::Today);
        assert_eq!(cli.timeout, 30);
    }

    #[test]
    fn test_tomorrow() {
        let cli =
            Cli::try_parse_from(["prisgraf", "--prisdag", "imorgen", "--timeout", "5"]).unwrap();

        assert_eq!(cli.prisdag, PriceDay::Tomorrow);
        assert_eq!(cli.timeout, 5);
    }

    #[test]
    fn test_invalid_day_is_rejected() {
        let err = Cli::try_parse_from(["prisgraf", "--prisdag", "igår"]).unwrap_err();

        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(err.to_string().contains("Ugyldig prisdag: igår"));
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
