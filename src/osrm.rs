//! OSRM HTTP adapter for distance matrices.
//!
//! Each call sends one chunk to the Table API: origins and destinations are
//! passed as a single coordinate list and selected with `sources` and
//! `destinations` index lists.

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::model::{Location, TransitMode};
use crate::traits::{ChunkLimits, GeoDistanceProvider, MatrixFragment};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub limits: ChunkLimits,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_secs: 10,
            limits: ChunkLimits::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn table_url(&self, origins: &[Location], destinations: &[Location], mode: TransitMode) -> String {
        table_url(&self.config.base_url, origins, destinations, mode)
    }

    fn convert_error(&self, error: &reqwest::Error, url: &str) -> ProviderError {
        if error.is_timeout() {
            return ProviderError::Timeout {
                url: url.to_string(),
                timeout_secs: self.config.timeout_secs,
            };
        }
        if let Some(status) = error.status() {
            return ProviderError::Http {
                url: url.to_string(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }
        ProviderError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

impl GeoDistanceProvider for OsrmClient {
    fn distances(
        &self,
        origins: &[Location],
        destinations: &[Location],
        mode: TransitMode,
    ) -> Result<MatrixFragment, ProviderError> {
        if origins.is_empty() || destinations.is_empty() {
            return Ok(vec![Vec::new(); origins.len()]);
        }

        let url = self.table_url(origins, destinations, mode);
        let body = self
            .client
            .get(&url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .map_err(|err| self.convert_error(&err, &url))?
            .json::<OsrmTableResponse>()
            .map_err(|err| ProviderError::Parse {
                message: err.to_string(),
            })?;

        body.into_fragment()
    }

    fn limits(&self) -> ChunkLimits {
        self.config.limits
    }
}

/// OSRM profile serving a transit mode. OSRM has no public-transit profile,
/// so transit is routed as driving.
pub fn profile_for(mode: TransitMode) -> &'static str {
    match mode {
        TransitMode::Driving | TransitMode::Transit => "car",
        TransitMode::Walking => "foot",
        TransitMode::Bicycling => "bike",
    }
}

fn table_url(base_url: &str, origins: &[Location], destinations: &[Location], mode: TransitMode) -> String {
    let coords = origins
        .iter()
        .chain(destinations)
        .map(|location| format!("{:.6},{:.6}", location.lng, location.lat))
        .collect::<Vec<_>>()
        .join(";");
    let sources = index_list(0..origins.len());
    let targets = index_list(origins.len()..origins.len() + destinations.len());

    format!(
        "{}/table/v1/{}/{}?sources={}&destinations={}&annotations=duration",
        base_url.trim_end_matches('/'),
        profile_for(mode),
        coords,
        sources,
        targets
    )
}

fn index_list(range: std::ops::Range<usize>) -> String {
    range.map(|i| i.to_string()).collect::<Vec<_>>().join(";")
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    message: Option<String>,
    durations: Option<Vec<Vec<Option<f64>>>>,
}

impl OsrmTableResponse {
    fn into_fragment(self) -> Result<MatrixFragment, ProviderError> {
        if self.code != "Ok" {
            return Err(ProviderError::Service {
                code: self.code,
                message: self.message.unwrap_or_default(),
            });
        }
        self.durations.ok_or_else(|| ProviderError::Parse {
            message: "OSRM response missing durations array".to_string(),
        })
    }
}
