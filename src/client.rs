use log::{debug, info};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::load_config;
use crate::data::{self, PowerData};
use crate::error::{PowerError, Result};
use crate::query::{PowerQuery, PowerRequest};

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the POWER endpoint family, typically
    /// `https://power.larc.nasa.gov/api`.
    pub url: String,
    /// Whether to verify TLS certificates.
    pub verify: bool,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Blocking client for the POWER API.
///
/// One HTTP request per invocation; the calling thread blocks until
/// completion or failure. The client holds no mutable state, so clones can
/// be used from multiple threads without coordination.
#[derive(Debug, Clone)]
pub struct Client {
    url: String,
    http: HttpClient,
}

/// Raw outcome of one successful request.
#[derive(Debug, Clone)]
pub struct PowerResponse {
    /// Final request URL.
    pub url: String,
    /// Payload bytes.
    pub body: Vec<u8>,
    /// Filename suggested by the `Content-Disposition` header.
    pub filename: Option<String>,
    /// Content type reported by the service.
    pub content_type: Option<String>,
}

impl Client {
    /// Creates a client using environment variables and/or `.nasapowerrc`.
    ///
    /// This is equivalent to `Client::new(None, None)`.
    pub fn from_env() -> Result<Self> {
        Self::new(None, None)
    }

    /// Creates a client using (in order of precedence):
    /// - explicit `url`/`verify` arguments
    /// - the `NASAPOWER_URL` environment variable
    /// - a config file from `NASAPOWER_RC` or `.nasapowerrc`
    /// - the built-in service defaults
    pub fn new(url: Option<String>, verify: Option<bool>) -> Result<Self> {
        let cfg = load_config(url, verify)?;
        Self::with_config(cfg)
    }

    /// Creates a client from an already-resolved configuration.
    pub fn with_config(cfg: ClientConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("nasapower/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("nasapower")),
        );

        let mut builder = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(cfg.timeout);

        if !cfg.verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build().map_err(|e| PowerError::Network {
            url: cfg.url.clone(),
            source: e,
        })?;

        Ok(Self { url: cfg.url, http })
    }

    /// The base URL requests are issued against.
    pub fn base_url(&self) -> &str {
        &self.url
    }

    /// Validates the query and assembles the request descriptor.
    pub fn build_request(&self, query: &PowerQuery) -> Result<PowerRequest> {
        query.build_request(&self.url)
    }

    /// Performs the single HTTP GET of the pipeline.
    ///
    /// Fails with [`PowerError::Network`] on transport failure and
    /// [`PowerError::Remote`] when the service answers with a non-success
    /// status. No retries.
    pub fn execute(&self, request: &PowerRequest) -> Result<PowerResponse> {
        let display_url = request.full_url();
        debug!("GET {display_url}");
        info!("starting retrieval from NASA POWER");

        let response = self
            .http
            .get(&request.url)
            .query(&request.params)
            .send()
            .map_err(|e| PowerError::Network {
                url: display_url.clone(),
                source: e,
            })?;

        let status = response.status();
        let url = response.url().to_string();
        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let body = response
            .bytes()
            .map_err(|e| PowerError::Network {
                url: url.clone(),
                source: e,
            })?
            .to_vec();

        if !status.is_success() {
            return Err(PowerError::Remote {
                status,
                url,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        info!("successfully retrieved data from NASA POWER");
        Ok(PowerResponse {
            url,
            body,
            filename,
            content_type,
        })
    }

    /// Runs the full pipeline: build the request, execute it, decode the
    /// payload, and optionally persist it.
    ///
    /// A directory `target` is completed with the server-suggested filename
    /// (or a `power_data.<ext>` fallback).
    pub fn retrieve(&self, query: &PowerQuery, target: Option<&Path>) -> Result<PowerData> {
        let request = self.build_request(query)?;
        let response = self.execute(&request)?;
        let parsed = data::parse(&response.body, query.format)?;

        if let Some(target) = target {
            let path = resolve_target(target, &response, query);
            data::persist(&parsed, &path, query.format)?;
            info!("wrote POWER data to {}", path.display());
        }

        Ok(parsed)
    }
}

/// Completes a directory target with the server-suggested filename.
fn resolve_target(target: &Path, response: &PowerResponse, query: &PowerQuery) -> PathBuf {
    if target.is_dir() {
        let name = response
            .filename
            .clone()
            .unwrap_or_else(|| format!("power_data.{}", query.format.extension()));
        target.join(name)
    } else {
        target.to_path_buf()
    }
}

/// Extracts the filename from a `Content-Disposition` header value such as
/// `attachment; filename=POWER_Point_Daily_20220101_20220201.csv`.
fn filename_from_disposition(value: &str) -> Option<String> {
    let (_, name) = value.split_once("filename=")?;
    let name = name
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches('"');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
