use crate::record::AttributeRecord;
use anyhow::Context;
use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// Why a single page could not be fetched. Always carries the offset so the
/// coordinator can log and move on.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request for offset {offset} failed: {source}")]
    Network {
        offset: usize,
        #[source]
        source: reqwest::Error,
    },

    #[error("offset {offset} returned status code {status}")]
    Status { offset: usize, status: u16 },

    #[error("could not decode response for offset {offset}: {source}")]
    Decode {
        offset: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("service rejected query at offset {offset} (code {code}): {message}")]
    Service { offset: usize, code: i64, message: String },
}

impl FetchError {
    pub fn offset(&self) -> usize {
        match self {
            FetchError::Network { offset, .. }
            | FetchError::Status { offset, .. }
            | FetchError::Decode { offset, .. }
            | FetchError::Service { offset, .. } => *offset,
        }
    }
}

/// Anything that can hand back one page of records. Shared across worker
/// threads, so implementations must be `Sync`.
pub trait PageSource: Sync {
    fn fetch_page(&self, offset: usize, page_size: usize) -> Result<Vec<AttributeRecord>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    features: Vec<Feature>,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    attributes: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Paginated reader for a feature-service `query` endpoint. Geometry is never
/// requested; only per-feature attributes are kept.
pub struct QueryClient {
    http: Client,
    url: String,
}

impl QueryClient {
    /// `timeout` of `None` means a request may wait indefinitely.
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, url: url.into() })
    }
}

impl PageSource for QueryClient {
    fn fetch_page(&self, offset: usize, page_size: usize) -> Result<Vec<AttributeRecord>, FetchError> {
        let offset_param = offset.to_string();
        let count_param = page_size.to_string();
        debug!("Requesting offset {} ({} records) from {}", offset, page_size, self.url);

        let response = self
            .http
            .get(&self.url)
            .query(&[
                ("where", "1=1"),
                ("outFields", "*"),
                ("returnGeometry", "false"),
                ("f", "json"),
                ("resultOffset", offset_param.as_str()),
                ("resultRecordCount", count_param.as_str()),
            ])
            .send()
            .map_err(|source| FetchError::Network { offset, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { offset, status: status.as_u16() });
        }

        let body = response
            .bytes()
            .map_err(|source| FetchError::Network { offset, source })?;
        decode_page(offset, &body)
    }
}

fn decode_page(offset: usize, body: &[u8]) -> Result<Vec<AttributeRecord>, FetchError> {
    let parsed: QueryResponse =
        serde_json::from_slice(body).map_err(|source| FetchError::Decode { offset, source })?;

    if let Some(err) = parsed.error {
        return Err(FetchError::Service { offset, code: err.code, message: err.message });
    }

    Ok(parsed
        .features
        .into_iter()
        .map(|feature| AttributeRecord::from(feature.attributes.unwrap_or_default()))
        .collect())
}
