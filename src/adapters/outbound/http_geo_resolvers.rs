//! HTTP GeoIP Resolvers
//!
//! Implements GeoResolver against public geolocation APIs. Each resolver
//! makes a single GET, validates the payload and maps it to a `GeoResult`.
//! The shared `reqwest::Client` carries the per-call timeout.

use crate::domain::entities::{format_location, Coordinates, GeoResult};
use crate::domain::ports::{GeoResolver, LookupError};
use crate::domain::value_objects::Accuracy;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const ABSTRACT_API_URL: &str = "https://ipgeolocation.abstractapi.com";
pub const IPAPI_CO_URL: &str = "https://ipapi.co";
pub const IPINFO_URL: &str = "https://ipinfo.io";
// ip-api.com only serves plain HTTP on the free tier.
pub const IP_API_COM_URL: &str = "http://ip-api.com";
pub const GEOLOCATION_DB_URL: &str = "https://geolocation-db.com";

/// Build the HTTP client shared by all geo resolvers.
pub fn build_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("linktrace/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// The production cascade in trust order.
///
/// The keyed resolver is only included when an API key is configured.
pub fn standard_resolvers(
    client: reqwest::Client,
    abstract_api_key: Option<String>,
) -> Vec<Arc<dyn GeoResolver>> {
    let mut resolvers: Vec<Arc<dyn GeoResolver>> = Vec::new();
    if let Some(key) = abstract_api_key.filter(|k| !k.trim().is_empty()) {
        resolvers.push(Arc::new(AbstractApiResolver::new(client.clone(), key)));
    }
    resolvers.push(Arc::new(IpApiCoResolver::new(client.clone())));
    resolvers.push(Arc::new(IpInfoResolver::new(client.clone())));
    resolvers.push(Arc::new(IpApiComResolver::new(client.clone())));
    resolvers.push(Arc::new(GeolocationDbResolver::new(client)));
    resolvers
}

pub(crate) fn map_reqwest_error(e: reqwest::Error) -> LookupError {
    if e.is_timeout() {
        LookupError::Timeout
    } else {
        LookupError::Transport(e.to_string())
    }
}

/// `base` with `segments` appended as path segments.
///
/// Each segment is percent-encoded, so an address carrying `/`, `?` or `#`
/// stays inside its own segment.
fn endpoint(base: &str, segments: &[&str]) -> Result<reqwest::Url, LookupError> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| LookupError::Transport(format!("invalid base URL {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| LookupError::Transport(format!("base URL {} cannot carry a path", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) async fn fetch_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, LookupError> {
    let resp = request.send().await.map_err(map_reqwest_error)?;

    let status = resp.status();
    if !status.is_success() {
        return Err(LookupError::Status(status.as_u16()));
    }

    let body = resp.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&body).map_err(|e| LookupError::Payload(e.to_string()))
}

// Providers disagree on whether numbers arrive as numbers or strings.
fn value_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref().and_then(value_f64))
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(match v {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn non_empty(s: &Option<String>) -> bool {
    s.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
}

fn or_unknown(geo_field: &mut String, value: Option<String>) {
    if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
        *geo_field = v;
    }
}

// ===== Keyed provider (AbstractAPI) =====

#[derive(Debug, Default, Deserialize)]
struct AbstractConnection {
    #[serde(default, deserialize_with = "lenient_string")]
    isp: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    autonomous_system_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    autonomous_system_organization: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AbstractTimezone {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AbstractCurrency {
    currency_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AbstractPayload {
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    continent: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    longitude: Option<f64>,
    #[serde(default)]
    connection: Option<AbstractConnection>,
    #[serde(default)]
    timezone: Option<AbstractTimezone>,
    #[serde(default)]
    currency: Option<AbstractCurrency>,
}

impl AbstractPayload {
    fn into_geo(self, ip: &str, provider: &str) -> Result<GeoResult, LookupError> {
        let coordinates = Coordinates::from_pair(self.latitude, self.longitude, Accuracy::High)
            .ok_or(LookupError::Rejected("missing latitude/longitude"))?;

        let location = format_location(&[
            self.city.as_deref(),
            self.region.as_deref(),
            self.country.as_deref(),
        ]);
        let mut geo = GeoResult::from_provider(ip, provider, location);
        let conn = self.connection.unwrap_or_default();
        or_unknown(&mut geo.isp, conn.isp);
        or_unknown(&mut geo.asn, conn.autonomous_system_number);
        or_unknown(&mut geo.org, conn.autonomous_system_organization);
        geo.coordinates = Some(coordinates);
        geo.timezone = self.timezone.and_then(|t| t.name);
        geo.currency = self.currency.and_then(|c| c.currency_name);
        geo.continent = self.continent.filter(|c| !c.is_empty());
        Ok(geo)
    }
}

/// Keyed provider returning coordinates directly. Highest trust.
pub struct AbstractApiResolver {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AbstractApiResolver {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self::with_base_url(client, ABSTRACT_API_URL, api_key)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: &str, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl GeoResolver for AbstractApiResolver {
    fn name(&self) -> &'static str {
        "abstractapi"
    }

    async fn lookup(&self, ip: &str) -> Result<GeoResult, LookupError> {
        let request = self
            .client
            .get(format!("{}/v1/", self.base_url))
            .query(&[("api_key", self.api_key.as_str()), ("ip_address", ip)]);
        let payload: AbstractPayload = fetch_json(request).await?;
        payload.into_geo(ip, self.name())
    }
}

// ===== Provider A (ipapi.co) =====

#[derive(Debug, Default, Deserialize)]
struct IpApiCoPayload {
    #[serde(default)]
    error: Option<bool>,
    #[serde(default)]
    reason: Option<String>,
    city: Option<String>,
    region: Option<String>,
    country_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    org: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    asn: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    longitude: Option<f64>,
    timezone: Option<String>,
    currency: Option<String>,
}

impl IpApiCoPayload {
    fn into_geo(self, ip: &str, provider: &str) -> Result<GeoResult, LookupError> {
        if self.error.unwrap_or(false) {
            tracing::debug!("{} error flag: {:?}", provider, self.reason);
            return Err(LookupError::Rejected("error flag set"));
        }
        if !non_empty(&self.city) || !non_empty(&self.country_name) {
            return Err(LookupError::Rejected("missing city or country"));
        }

        let location = format_location(&[
            self.city.as_deref(),
            self.region.as_deref(),
            self.country_name.as_deref(),
        ]);
        let mut geo = GeoResult::from_provider(ip, provider, location);
        or_unknown(&mut geo.isp, self.org.clone());
        or_unknown(&mut geo.asn, self.asn);
        or_unknown(&mut geo.org, self.org);
        geo.coordinates = Coordinates::from_pair(self.latitude, self.longitude, Accuracy::Medium);
        geo.timezone = self.timezone;
        geo.currency = self.currency;
        Ok(geo)
    }
}

/// Free-tier HTTPS provider with city-level validation.
pub struct IpApiCoResolver {
    client: reqwest::Client,
    base_url: String,
}

impl IpApiCoResolver {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, IPAPI_CO_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GeoResolver for IpApiCoResolver {
    fn name(&self) -> &'static str {
        "ipapi.co"
    }

    async fn lookup(&self, ip: &str) -> Result<GeoResult, LookupError> {
        let request = self.client.get(endpoint(&self.base_url, &[ip, "json", ""])?);
        let payload: IpApiCoPayload = fetch_json(request).await?;
        payload.into_geo(ip, self.name())
    }
}

// ===== Provider B (ipinfo.io) =====

#[derive(Debug, Default, Deserialize)]
struct IpInfoPayload {
    #[serde(default)]
    error: Option<Value>,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    org: Option<String>,
    loc: Option<String>,
    timezone: Option<String>,
}

/// Parse ipinfo's combined `"lat,lon"` field.
fn parse_loc(loc: &str) -> Option<(f64, f64)> {
    let (lat, lon) = loc.split_once(',')?;
    Some((lat.trim().parse().ok()?, lon.trim().parse().ok()?))
}

impl IpInfoPayload {
    fn into_geo(self, ip: &str, provider: &str) -> Result<GeoResult, LookupError> {
        if self.error.as_ref().map(|e| !e.is_null()).unwrap_or(false) {
            return Err(LookupError::Rejected("error object present"));
        }
        if !non_empty(&self.city) || !non_empty(&self.country) {
            return Err(LookupError::Rejected("missing city or country"));
        }

        let location = format_location(&[
            self.city.as_deref(),
            self.region.as_deref(),
            self.country.as_deref(),
        ]);
        let mut geo = GeoResult::from_provider(ip, provider, location);

        // org looks like "AS15169 Google LLC"
        if let Some(org) = self.org.filter(|o| !o.trim().is_empty()) {
            let org = org.trim();
            let (asn, rest) = org.split_once(' ').unwrap_or((org, ""));
            geo.isp = org.to_string();
            geo.asn = asn.to_string();
            if !rest.trim().is_empty() {
                geo.org = rest.trim().to_string();
            }
        }

        geo.coordinates = self
            .loc
            .as_deref()
            .and_then(parse_loc)
            .and_then(|(lat, lon)| Coordinates::from_pair(Some(lat), Some(lon), Accuracy::Medium));
        geo.timezone = self.timezone;
        Ok(geo)
    }
}

/// Free-tier HTTPS provider; coordinates arrive as one `"lat,lon"` string.
pub struct IpInfoResolver {
    client: reqwest::Client,
    base_url: String,
}

impl IpInfoResolver {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, IPINFO_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GeoResolver for IpInfoResolver {
    fn name(&self) -> &'static str {
        "ipinfo.io"
    }

    async fn lookup(&self, ip: &str) -> Result<GeoResult, LookupError> {
        let request = self.client.get(endpoint(&self.base_url, &[ip, "json"])?);
        let payload: IpInfoPayload = fetch_json(request).await?;
        payload.into_geo(ip, self.name())
    }
}

// ===== Provider C (ip-api.com) =====

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpApiComPayload {
    status: Option<String>,
    city: Option<String>,
    region_name: Option<String>,
    country: Option<String>,
    isp: Option<String>,
    #[serde(rename = "as")]
    as_name: Option<String>,
    org: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    lon: Option<f64>,
    timezone: Option<String>,
}

impl IpApiComPayload {
    fn into_geo(self, ip: &str, provider: &str) -> Result<GeoResult, LookupError> {
        if self.status.as_deref() != Some("success") {
            return Err(LookupError::Rejected("status is not success"));
        }

        let location = format_location(&[
            self.city.as_deref(),
            self.region_name.as_deref(),
            self.country.as_deref(),
        ]);
        let mut geo = GeoResult::from_provider(ip, provider, location);
        or_unknown(&mut geo.isp, self.isp);
        or_unknown(&mut geo.asn, self.as_name);
        or_unknown(&mut geo.org, self.org);
        geo.coordinates = Coordinates::from_pair(self.lat, self.lon, Accuracy::Medium);
        geo.timezone = self.timezone;
        Ok(geo)
    }
}

/// Plain-HTTP provider validated by its status flag.
pub struct IpApiComResolver {
    client: reqwest::Client,
    base_url: String,
}

impl IpApiComResolver {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, IP_API_COM_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GeoResolver for IpApiComResolver {
    fn name(&self) -> &'static str {
        "ip-api.com"
    }

    async fn lookup(&self, ip: &str) -> Result<GeoResult, LookupError> {
        let request = self.client.get(endpoint(&self.base_url, &["json", ip])?);
        let payload: IpApiComPayload = fetch_json(request).await?;
        payload.into_geo(ip, self.name())
    }
}

// ===== Provider D (geolocation-db.com) =====

#[derive(Debug, Default, Deserialize)]
struct GeolocationDbPayload {
    country_name: Option<String>,
    city: Option<String>,
    state: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    longitude: Option<f64>,
}

// geolocation-db fills unknown fields with this literal
const NOT_FOUND: &str = "Not found";

fn known(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty() && v != NOT_FOUND)
}

impl GeolocationDbPayload {
    fn into_geo(self, ip: &str, provider: &str) -> Result<GeoResult, LookupError> {
        let country = known(self.country_name).ok_or(LookupError::Rejected("missing country"))?;
        let city = known(self.city);
        let state = known(self.state);

        let location = format_location(&[city.as_deref(), state.as_deref(), Some(country.as_str())]);
        let mut geo = GeoResult::from_provider(ip, provider, location);
        geo.coordinates = Coordinates::from_pair(self.latitude, self.longitude, Accuracy::Low);
        Ok(geo)
    }
}

/// Backup provider with the weakest validation (country only).
pub struct GeolocationDbResolver {
    client: reqwest::Client,
    base_url: String,
}

impl GeolocationDbResolver {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, GEOLOCATION_DB_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GeoResolver for GeolocationDbResolver {
    fn name(&self) -> &'static str {
        "geolocation-db.com"
    }

    async fn lookup(&self, ip: &str) -> Result<GeoResult, LookupError> {
        let request = self.client.get(endpoint(&self.base_url, &["json", ip])?);
        let payload: GeolocationDbPayload = fetch_json(request).await?;
        payload.into_geo(ip, self.name())
    }
}
