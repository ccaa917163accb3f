use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use super::soql::SoqlQuery;
use super::transport::{HttpRequest, ReqwestTransport, Transport};
use crate::config::SocrataConfig;
use crate::error::{Error, Result};

pub const APP_TOKEN_HEADER: &str = "X-App-Token";

/// Largest `$limit` every SODA endpoint honours; 2.0 endpoints silently cap above it
pub const MAX_PAGE_SIZE: u64 = 50_000;

/// Socrata's stable row identifier, used to order pages when the caller didn't
const DEFAULT_PAGE_ORDER: &str = ":id";

/// One dataset row: column name to value, exactly as the service sent it
pub type Row = Map<String, Value>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SocrataError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Client for Socrata resource endpoints (`/resource/xxxx-xxxx.json`).
///
/// Rows are returned untyped; the dataset schema belongs to the caller.
pub struct OpenDataClient<T: Transport = ReqwestTransport> {
    transport: T,
    app_token: Option<String>,
    page_size: u64,
}

impl OpenDataClient<ReqwestTransport> {
    pub fn new(config: &SocrataConfig, timeout: Duration) -> Result<Self> {
        Ok(Self::with_transport(ReqwestTransport::new(timeout)?, config))
    }
}

impl<T: Transport> OpenDataClient<T> {
    pub fn with_transport(transport: T, config: &SocrataConfig) -> Self {
        Self {
            transport,
            app_token: None,
            page_size: config.page_size.max(1),
        }
        .with_app_token(config.app_token.clone())
    }

    /// Replace the app token; blank tokens are treated as absent
    pub fn with_app_token(mut self, token: Option<String>) -> Self {
        self.app_token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        self
    }

    pub fn build_url(&self, endpoint: &str, clauses: &SoqlQuery) -> Result<Url> {
        clauses.to_url(endpoint)
    }

    /// Run one SoQL query and return the matching rows.
    ///
    /// Zero matching rows is `Ok` with an empty vector.
    pub fn query(&self, endpoint: &str, clauses: &SoqlQuery) -> Result<Vec<Row>> {
        self.query_as(endpoint, clauses)
    }

    /// Like [`query`](Self::query), deserializing each row into a caller-defined type.
    pub fn query_as<R: DeserializeOwned>(&self, endpoint: &str, clauses: &SoqlQuery) -> Result<Vec<R>> {
        let url = self.build_url(endpoint, clauses)?;
        let mut request = HttpRequest::get(url);
        if let Some(token) = &self.app_token {
            request = request.with_header(APP_TOKEN_HEADER, token);
        }

        let response = self.transport.execute(&request)?;
        if !response.is_success() {
            return Err(Error::Transport(status_message(response.status, &response.body)));
        }

        let rows: Vec<R> = serde_json::from_str(&response.body)
            .map_err(|e| Error::Parse(format!("expected a JSON array of rows: {e}")))?;
        debug!(url = %request.url, rows = rows.len(), "open data query complete");
        Ok(rows)
    }

    /// Fetch every matching row by paging with `$limit`/`$offset`.
    ///
    /// The query's own `$limit` sets the page size (the configured default
    /// otherwise), clamped to [`MAX_PAGE_SIZE`] so a server-side cap can't be
    /// mistaken for the last page. `$offset` sets the starting row. Pages are
    /// ordered by `:id` unless the query sets `$order`. Stops at the first short page.
    pub fn query_all(&self, endpoint: &str, clauses: &SoqlQuery) -> Result<Vec<Row>> {
        let page_size = clauses
            .limit
            .unwrap_or(self.page_size)
            .clamp(1, MAX_PAGE_SIZE);
        let mut offset = clauses.offset.unwrap_or(0);
        let mut base = clauses.clone();
        if base.order.as_deref().is_none_or(|o| o.trim().is_empty()) {
            base.order = Some(DEFAULT_PAGE_ORDER.to_string());
        }

        let mut rows = Vec::new();
        loop {
            let page = self.query(endpoint, &base.clone().limit(page_size).offset(offset))?;
            let fetched = page.len() as u64;
            rows.extend(page);
            if fetched < page_size {
                break;
            }
            offset += page_size;
        }

        debug!(rows = rows.len(), page_size, "paged open data query complete");
        Ok(rows)
    }
}

fn status_message(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<SocrataError>(body)
        .ok()
        .and_then(|e| {
            let message = e.message?;
            Some(match e.error_code.or(e.code) {
                Some(code) => format!("{message} ({code})"),
                None => message,
            })
        })
        .unwrap_or_else(|| body.chars().take(200).collect::<String>().trim().to_string());
    format!("open data endpoint returned error status {status}: {detail}")
}
