//! Geocoding enrichment with per-run caching and provider rate limiting.
//!
//! Used only by the ingestion path; store-to-store migration never geocodes
//! because the source rows already carry their coordinates.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::GeocodeOptions;
use crate::error::{Error, Result};
use crate::record::validate_coordinates;

/// Cache key: `(postal_code, city)`.
///
/// Street is intentionally excluded; the provider does not guarantee
/// street-level precision and bucketing by postal code keeps the cache
/// bounded by the number of distinct areas, not by record count.
pub type CacheKey = (String, String);

/// Process-scoped memo of address key to coordinates.
///
/// `None` values are negative cache entries: a failing lookup is never
/// retried within the same run.
#[derive(Debug, Default)]
pub struct GeocodeCache {
    entries: HashMap<CacheKey, Option<(f64, f64)>>,
}

impl GeocodeCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a key. The outer `Option` distinguishes "never looked up"
    /// from a cached negative result.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Option<(f64, f64)>> {
        self.entries.get(key).copied()
    }

    /// Stores a lookup outcome.
    pub fn insert(&mut self, key: CacheKey, coords: Option<(f64, f64)>) {
        self.entries.insert(key, coords);
    }

    /// Number of distinct keys observed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One search hit from a Nominatim-compatible provider.
///
/// Nominatim serializes coordinates as strings.
#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

/// Minimal client for the Nominatim search API.
pub struct NominatimClient {
    client: Client,
    endpoint: String,
}

impl NominatimClient {
    /// Creates a client against the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: &str, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Resolves a free-form address to `(lat, lon)`, `None` when the
    /// provider has no match.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, transport failure or a non-success
    /// status.
    pub async fn search(&self, address: &str, timeout: Duration) -> Result<Option<(f64, f64)>> {
        let url = format!("{}/search", self.endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;

        let hits: Vec<SearchHit> = response.json().await?;
        let Some(hit) = hits.first() else {
            return Ok(None);
        };

        let lat: f64 = hit
            .lat
            .parse()
            .map_err(|_| Error::Geometry(format!("Provider returned bad latitude '{}'", hit.lat)))?;
        let lon: f64 = hit
            .lon
            .parse()
            .map_err(|_| Error::Geometry(format!("Provider returned bad longitude '{}'", hit.lon)))?;
        validate_coordinates(lon, lat)?;

        Ok(Some((lat, lon)))
    }
}

/// Rate-limited geocoder backed by [`GeocodeCache`].
pub struct GeocodeEnricher {
    client: NominatimClient,
    cache: GeocodeCache,
    timeout: Duration,
    min_interval: Duration,
}

impl GeocodeEnricher {
    /// Builds an enricher from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(options: &GeocodeOptions) -> Result<Self> {
        Ok(Self {
            client: NominatimClient::new(&options.endpoint, &options.user_agent)?,
            cache: GeocodeCache::new(),
            timeout: Duration::from_secs(options.timeout_secs),
            min_interval: Duration::from_millis(options.min_interval_ms),
        })
    }

    /// Resolves an address to coordinates.
    ///
    /// Cache hits return immediately without touching the provider. On a
    /// miss, one provider call is made; timeouts and provider errors are
    /// treated as "not found" and cached negatively. After every miss the
    /// enricher pauses for the configured minimum interval before
    /// returning control, to honor the provider's rate limit.
    pub async fn resolve(
        &mut self,
        street: Option<&str>,
        postal_code: &str,
        city: &str,
    ) -> Option<(f64, f64)> {
        let key = (postal_code.to_string(), city.to_string());
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        let address = format_address(street, postal_code, city);
        let coords = match self.client.search(&address, self.timeout).await {
            Ok(coords) => {
                debug!("Geocoded '{}' -> {:?}", address, coords);
                coords
            }
            Err(e) => {
                warn!("Geocoding failed for '{}': {}", address, e);
                None
            }
        };

        self.cache.insert(key, coords);
        // Blocking pause, not best-effort: the provider's rate limit binds
        // the whole pipeline.
        sleep(self.min_interval).await;
        coords
    }

    /// Number of distinct `(postal_code, city)` keys seen so far.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

/// Formats the provider query string the way the original importer did.
fn format_address(street: Option<&str>, postal_code: &str, city: &str) -> String {
    match street {
        Some(street) if !street.trim().is_empty() => {
            format!("{street}, {postal_code} {city}, Germany")
        }
        _ => format!("{postal_code} {city}, Germany"),
    }
}
