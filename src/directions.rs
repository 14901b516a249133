use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::warn;

use crate::geo::{validate_coordinates, GeoPoint};

/// Bound on a route-calculation request. Past this the call fails with
/// [`DirectionsError::Timeout`].
pub const ROUTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Failures from the routing provider.
///
/// Route calculation has no local fallback, so unlike report submission these
/// propagate to the caller, and a timeout stays distinguishable from other
/// network failures.
#[derive(Debug)]
pub enum DirectionsError {
    /// The request exceeded [`ROUTE_TIMEOUT`].
    Timeout,
    /// Transport-level failure.
    Http(reqwest::Error),
    /// The provider answered with an error and no usable route.
    Api {
        /// HTTP status the provider returned.
        status: StatusCode,
        /// Provider-supplied message, if any.
        message: String,
    },
    /// A well-formed response with no routes in it.
    NoRoute,
}

impl std::fmt::Display for DirectionsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectionsError::Timeout => write!(f, "route request timed out"),
            DirectionsError::Http(e) => write!(f, "route request failed: {e}"),
            DirectionsError::Api { status, message } => {
                write!(f, "route calculation failed: {status} - {message}")
            }
            DirectionsError::NoRoute => write!(f, "no routes found in response"),
        }
    }
}

impl std::error::Error for DirectionsError {}

impl From<reqwest::Error> for DirectionsError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            DirectionsError::Timeout
        } else {
            DirectionsError::Http(error)
        }
    }
}

/// A calculated route.
#[derive(Debug, Clone, Deserialize)]
pub struct Route {
    /// The route's legs, in travel order.
    pub legs: Vec<RouteLeg>,
}

/// One leg of a route.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteLeg {
    /// Polyline of the leg.
    pub points: Vec<RoutePoint>,
    /// Aggregate figures for the leg.
    pub summary: LegSummary,
}

/// A vertex of a route polyline.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RoutePoint {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

/// Aggregate figures for a route leg.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegSummary {
    /// Leg length in meters.
    pub length_in_meters: f64,
}

/// A geocoding suggestion or place lookup result.
#[derive(Debug, Clone, Deserialize)]
pub struct Place {
    /// Provider-assigned place id.
    #[serde(default)]
    pub id: Option<String>,
    /// Position of the place.
    pub position: GeoPoint,
    /// Address details.
    #[serde(default)]
    pub address: Option<Address>,
}

/// Address details of a [`Place`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Single-line human-readable address.
    #[serde(default)]
    pub freeform_address: Option<String>,
}

/// Client for the TomTom-style routing and geocoding provider.
pub struct DirectionsClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl DirectionsClient {
    const DEFAULT_BASE_URL: &'static str = "https://api.tomtom.com";

    /// A client using the given API key against the production endpoints.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Calculate the fastest car route between two `"lat,lon"` endpoints.
    ///
    /// Embedded whitespace in the coordinates is stripped before the request.
    /// A non-success status that nonetheless carries route data is accepted;
    /// the provider is known to do this for some near-ambiguous requests.
    pub async fn route(&self, start: &str, end: &str) -> Result<Route, DirectionsError> {
        #[derive(Deserialize)]
        struct RouteResponse {
            #[serde(default)]
            routes: Vec<Route>,
            #[serde(default)]
            error: Option<ApiError>,
        }

        #[derive(Deserialize)]
        struct ApiError {
            #[serde(default)]
            message: Option<String>,
        }

        let start: String = start.split_whitespace().collect();
        let end: String = end.split_whitespace().collect();

        let url = format!(
            "{}/routing/1/calculateRoute/{start}:{end}/json",
            self.base_url
        );
        let response = self
            .client
            .get(url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("travelMode", "car"),
                ("routeType", "fastest"),
                ("traffic", "false"),
            ])
            .timeout(ROUTE_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        let body: RouteResponse = response.json().await?;

        if !status.is_success() {
            // Some error responses still carry a usable route.
            if let Some(route) = body.routes.into_iter().next() {
                warn!(%status, "route API returned an error status with route data, proceeding");
                return Ok(route);
            }

            return Err(DirectionsError::Api {
                status,
                message: body
                    .error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| "Unknown error".to_string()),
            });
        }

        body.routes
            .into_iter()
            .next()
            .ok_or(DirectionsError::NoRoute)
    }

    /// Typeahead suggestions for a free-text query.
    ///
    /// Empty on any failure, and without a network round trip for queries
    /// that are empty or already coordinate-shaped.
    pub async fn suggestions(&self, query: &str) -> Vec<Place> {
        #[derive(Deserialize)]
        struct SearchResponse {
            #[serde(default)]
            results: Vec<Place>,
        }

        let query = query.trim();
        if query.is_empty() || validate_coordinates(query) {
            return Vec::new();
        }

        let url = format!(
            "{}/search/2/search/{}.json",
            self.base_url,
            urlencode(query)
        );
        let request = self
            .client
            .get(url)
            .query(&[("key", self.api_key.as_str()), ("limit", "5"), ("typeahead", "true")]);

        match send_absorbing_errors::<SearchResponse>(request).await {
            Some(body) => body.results,
            None => Vec::new(),
        }
    }

    /// Details for a place previously returned by [`Self::suggestions`].
    /// `None` on any failure.
    pub async fn place_details(&self, place_id: &str) -> Option<Place> {
        #[derive(Deserialize)]
        struct SearchResponse {
            #[serde(default)]
            results: Vec<Place>,
        }

        let url = format!(
            "{}/search/2/poiSearch/{}.json",
            self.base_url,
            urlencode(place_id)
        );
        let request = self.client.get(url).query(&[("key", self.api_key.as_str())]);

        send_absorbing_errors::<SearchResponse>(request)
            .await
            .and_then(|body| body.results.into_iter().next())
    }
}

/// Send an enrichment request, absorbing every failure into `None`.
async fn send_absorbing_errors<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Option<T> {
    let response = match request.send().await {
        Ok(response) => response,
        Err(error) => {
            warn!(%error, "search request failed");
            return None;
        }
    };

    if !response.status().is_success() {
        warn!(status = %response.status(), "search API returned an error status");
        return None;
    }

    match response.json().await {
        Ok(body) => Some(body),
        Err(error) => {
            warn!(%error, "search response was not the expected shape");
            None
        }
    }
}

/// Percent-encode a path segment.
fn urlencode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
