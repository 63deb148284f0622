use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod chart;

/// Fixed GraphQL endpoint of the Tibber API.
pub const TIBBER_API_ENDPOINT: &str = "https://api.tibber.com/v1-beta/gql";

/// Environment variable holding the bearer token.
pub const TOKEN_ENV_VAR: &str = "TIBBER_API_TOKEN";

/// Request timeout used unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of 15 minute slots in one hour.
pub const QUARTERS_PER_HOUR: usize = 4;

/// Price info for every home of the authenticated account.
pub const PRICE_QUERY: &str = r"{
  viewer {
    homes {
      currentSubscription {
        priceInfo {
          current { total energy tax startsAt }
          today { total energy tax startsAt }
          tomorrow { total energy tax startsAt }
        }
      }
    }
  }
}";

/// One hour's electricity price breakdown.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    /// Total price including taxes
    pub total: f64,
    /// Spot price part
    pub energy: f64,
    /// Tax part
    pub tax: f64,
    /// Start of the hour this price applies to
    pub starts_at: DateTime<FixedOffset>,
}

/// Current, today's and tomorrow's prices for one home.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PriceInfo {
    #[serde(default)]
    pub current: Option<PricePoint>,
    /// Hourly prices for today
    #[serde(default, deserialize_with = "null_as_empty")]
    pub today: Vec<PricePoint>,
    /// Hourly prices for tomorrow. Empty until Tibber publishes them.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tomorrow: Vec<PricePoint>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<PricePoint>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<PricePoint>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Which day's prices to show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PriceDay {
    #[default]
    Today,
    Tomorrow,
}

impl PriceDay {
    /// Returns the price series of this day.
    pub fn series(self, info: &PriceInfo) -> &[PricePoint] {
        match self {
            PriceDay::Today => &info.today,
            PriceDay::Tomorrow => &info.tomorrow,
        }
    }

    /// Returns the color the chart of this day is drawn in.
    pub const fn color(self) -> chart::SeriesColor {
        match self {
            PriceDay::Today => chart::SeriesColor::Green,
            PriceDay::Tomorrow => chart::SeriesColor::Red,
        }
    }

    /// Returns the command line token of this day.
    pub const fn as_str(self) -> &'static str {
        match self {
            PriceDay::Today => "idag",
            PriceDay::Tomorrow => "imorgen",
        }
    }
}

impl fmt::Display for PriceDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceDay {
    type Err = TibberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idag" => Ok(PriceDay::Today),
            "imorgen" => Ok(PriceDay::Tomorrow),
            other => Err(TibberError::InvalidDay(other.to_owned())),
        }
    }
}

/// Bearer token for the Tibber API.
#[derive(Clone)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Reads the token from `TIBBER_API_TOKEN`.
    pub fn from_env() -> Result<Self, TibberError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the token through `lookup`. A missing or blank value is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TibberError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        lookup(TOKEN_ENV_VAR)
            .map(|token| token.trim().to_owned())
            .filter(|token| !token.is_empty())
            .map(Self)
            .ok_or(TibberError::MissingToken)
    }

    fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

#[derive(Error, Debug)]
pub enum TibberError {
    #[error("Ugyldig prisdag: {0}")]
    InvalidDay(String),
    #[error("TIBBER_API_TOKEN er ikke satt")]
    MissingToken,
    #[error("Klarte ikke lage json av requesten: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("Det er noe galt med requesten: {0}")]
    Request(#[source] reqwest::Error),
    #[error("Feil ved henting av data fra tibber: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("Klarte ikke lese responsen fra tibber: {0}")]
    ReadBody(#[source] reqwest::Error),
    #[error("Klarte ikke deserialisere responsen til tibber: {source}\n{body}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },
    #[error("Tibber svarte med feil: {}", .0.join("; "))]
    Api(Vec<String>),
    #[error("Fant ingen hjem på kontoen")]
    NoHomes,
    #[error("Hjemmet har ikke et aktivt abonnement")]
    NoSubscription,
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct ResponseData {
    viewer: Viewer,
}

#[derive(Deserialize)]
struct Viewer {
    homes: Vec<Home>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Home {
    current_subscription: Option<Subscription>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Subscription {
    price_info: PriceInfo,
}

/// Builds the JSON request body `{"query": PRICE_QUERY}`.
pub fn price_query_body() -> Result<Vec<u8>, TibberError> {
    serde_json::to_vec(&GraphQlRequest { query: PRICE_QUERY }).map_err(TibberError::Serialize)
}

/// Decodes a response body and returns the price info of the first home.
///
/// Any further homes are ignored.
pub fn decode_price_info(body: &[u8]) -> Result<PriceInfo, TibberError> {
    let decode_error = |source: serde_json::Error| TibberError::Decode {
        source,
        body: String::from_utf8_lossy(body).into_owned(),
    };

    let response: GraphQlResponse = serde_json::from_slice(body).map_err(decode_error)?;

    let data = match response.data {
        Some(data) => data,
        None if !response.errors.is_empty() => {
            return Err(TibberError::Api(
                response.errors.into_iter().map(|e| e.message).collect(),
            ))
        }
        None => return Err(decode_error(serde::de::Error::missing_field("data"))),
    };

    if !response.errors.is_empty() {
        warn!(
            errors = response.errors.len(),
            "tibber returned partial data with errors"
        );
    }

    data.viewer
        .homes
        .into_iter()
        .next()
        .ok_or(TibberError::NoHomes)?
        .current_subscription
        .map(|subscription| subscription.price_info)
        .ok_or(TibberError::NoSubscription)
}

/// Expands hourly prices to quarter hour resolution.
///
/// Every total is repeated [`QUARTERS_PER_HOUR`] times, without smoothing between hours.
pub fn quarter_hour_series(points: &[PricePoint]) -> Vec<f64> {
    points
        .iter()
        .flat_map(|point| std::iter::repeat(point.total).take(QUARTERS_PER_HOUR))
        .collect()
}

/// Client for the Tibber GraphQL API.
#[derive(Debug, Clone)]
pub struct TibberClient {
    endpoint: String,
    token: ApiToken,
    client: reqwest::Client,
}

impl TibberClient {
    /// Creates a client with the [`DEFAULT_TIMEOUT`].
    pub fn new(token: ApiToken) -> Result<Self, TibberError> {
        Self::with_timeout(token, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(token: ApiToken, timeout: Duration) -> Result<Self, TibberError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TibberError::Request)?;

        Ok(Self {
            endpoint: TIBBER_API_ENDPOINT.to_owned(),
            token,
            client,
        })
    }

    /// Sends requests to `endpoint` instead of [`TIBBER_API_ENDPOINT`].
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POSTs `body` to the endpoint and returns the complete response body.
    ///
    /// The status code is not interpreted here. Tibber reports most failures in
    /// the body, which [`decode_price_info`] turns into an error.
    pub async fn post_query(&self, body: Vec<u8>) -> Result<Vec<u8>, TibberError> {
        let request = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .bearer_auth(self.token.secret())
            .body(body)
            .build()
            .map_err(TibberError::Request)?;

        debug!(endpoint = %self.endpoint, "posting price query");
        let response = self
            .client
            .execute(request)
            .await
            .map_err(TibberError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "tibber responded with non-success status");
        }

        let body = response.bytes().await.map_err(TibberError::ReadBody)?;
        debug!(bytes = body.len(), %status, "received response");
        Ok(body.to_vec())
    }

    /// Queries the price info of the first home on the account.
    pub async fn fetch_price_info(&self) -> Result<PriceInfo, TibberError> {
        let body = price_query_body()?;
        let response = self.post_query(body).await?;
        let info = decode_price_info(&response)?;

        debug!(
            today = info.today.len(),
            tomorrow = info.tomorrow.len(),
            "decoded price info"
        );
        Ok(info)
    }
}

/// This is a shortcut for `TibberClient::new(token)?.fetch_price_info()`.
pub async fn query_price_info(token: ApiToken) -> Result<PriceInfo, TibberError> {
    TibberClient::new(token)?.fetch_price_info().await
}
