use reqwest::Url;

use crate::error::{Error, Result};

/// A set of optional SoQL clauses, serialized as `$`-prefixed query parameters
///
/// Nothing is mandatory; absent or blank clauses are left out of the URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoqlQuery {
    pub select: Option<String>,
    pub filter: Option<String>,
    pub order: Option<String>,
    pub group: Option<String>,
    pub having: Option<String>,
    pub search: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SoqlQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// `$select`: columns or expressions to return
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.select = Some(columns.into());
        self
    }

    /// `$where`: row filter predicate
    pub fn filter(mut self, predicate: impl Into<String>) -> Self {
        self.filter = Some(predicate.into());
        self
    }

    /// `$order`: sort specification, e.g. `date DESC`
    pub fn order(mut self, spec: impl Into<String>) -> Self {
        self.order = Some(spec.into());
        self
    }

    /// `$group`: aggregation columns
    pub fn group(mut self, columns: impl Into<String>) -> Self {
        self.group = Some(columns.into());
        self
    }

    /// `$having`: filter applied after `$group`
    pub fn having(mut self, predicate: impl Into<String>) -> Self {
        self.having = Some(predicate.into());
        self
    }

    /// `$q`: full-text search across all columns
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// `$limit`: maximum rows returned
    pub fn limit(mut self, rows: u64) -> Self {
        self.limit = Some(rows);
        self
    }

    /// `$offset`: rows to skip
    pub fn offset(mut self, rows: u64) -> Self {
        self.offset = Some(rows);
        self
    }

    /// Present clauses as (parameter, value) pairs, in a fixed order
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let text = [
            ("$select", &self.select),
            ("$where", &self.filter),
            ("$order", &self.order),
            ("$group", &self.group),
            ("$having", &self.having),
            ("$q", &self.search),
        ];
        let numeric = [("$limit", self.limit), ("$offset", self.offset)];

        let mut params: Vec<(&'static str, String)> = text
            .into_iter()
            .filter_map(|(key, value)| {
                let value = value.as_deref()?.trim();
                (!value.is_empty()).then(|| (key, value.to_string()))
            })
            .collect();
        params.extend(
            numeric
                .into_iter()
                .filter_map(|(key, value)| value.map(|v| (key, v.to_string()))),
        );
        params
    }

    pub fn is_empty(&self) -> bool {
        self.params().is_empty()
    }

    /// The full request URL for `endpoint`.
    ///
    /// With no clauses this is the bare `{endpoint}.json` with no query string.
    pub fn to_url(&self, endpoint: &str) -> Result<Url> {
        let mut url = resource_url(endpoint)?;
        let params = self.params();
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }
}

/// Normalise a Socrata resource endpoint to its `.json` form
fn resource_url(endpoint: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint.trim())
        .map_err(|e| Error::InvalidInput(format!("invalid endpoint {endpoint}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidInput(format!(
            "endpoint must be http or https: {endpoint}"
        )));
    }

    let path = url.path().trim_end_matches('/').to_string();
    if path.is_empty() {
        return Err(Error::InvalidInput(format!(
            "endpoint has no resource path: {endpoint}"
        )));
    }
    if !path.ends_with(".json") {
        url.set_path(&format!("{path}.json"));
    }
    Ok(url)
}
