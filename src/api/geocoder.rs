use std::collections::HashSet;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::transport::{HttpRequest, ReqwestTransport, Transport};
use crate::config::GeocoderConfig;
use crate::domain::{AddressCandidate, AddressRecord, Crs, GeoPoint, GeocodeResult, PartialAddress};
use crate::error::{Error, Result};

const SERVICE: &str = "geocode service";

/// Every coordinate exchanged with the service is Web Mercator
const OUT_SR: &str = "3857";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpatialReference {
    #[serde(default)]
    wkid: Option<u32>,
    #[serde(default)]
    latest_wkid: Option<u32>,
}

impl SpatialReference {
    fn crs(&self) -> Result<Crs> {
        match self.latest_wkid.or(self.wkid) {
            Some(wkid) => Crs::from_wkid(wkid),
            None => Ok(Crs::WebMercator),
        }
    }
}

/// ArcGIS sends unmatched coordinates as null, "NaN", or omits them
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLocation {
    #[serde(default)]
    x: Value,
    #[serde(default)]
    y: Value,
    #[serde(default)]
    spatial_reference: Option<SpatialReference>,
}

impl RawLocation {
    /// The point in its own spatial reference, or `fallback` when it carries none.
    ///
    /// `Ok(None)` means the service sent no usable coordinates.
    fn point(&self, fallback: Crs) -> Result<Option<GeoPoint>> {
        let crs = match &self.spatial_reference {
            Some(sr) => sr.crs()?,
            None => fallback,
        };
        let (Some(x), Some(y)) = (coordinate(&self.x), coordinate(&self.y)) else {
            return Ok(None);
        };
        let point = GeoPoint::new(x, y, crs);
        Ok(point.is_finite().then_some(point))
    }
}

fn coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchResponse {
    #[serde(default)]
    spatial_reference: Option<SpatialReference>,
    locations: Vec<BatchLocation>,
}

#[derive(Debug, Deserialize)]
struct BatchLocation {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    location: Option<RawLocation>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    attributes: Map<String, Value>,
}

impl BatchLocation {
    fn result_id(&self) -> Option<i64> {
        match self.attributes.get("ResultID")? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn score(&self) -> f64 {
        self.score
            .or_else(|| self.attributes.get("Score").and_then(Value::as_f64))
            .unwrap_or(0.0)
    }

    fn is_unmatched(&self) -> bool {
        let status = self.attributes.get("Status").and_then(Value::as_str);
        status == Some("U") || self.score() <= 0.0
    }

    fn address(&self) -> String {
        self.address
            .clone()
            .or_else(|| string_attr(&self.attributes, "Match_addr"))
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<Map<String, Value>>,
    #[serde(default)]
    location: Option<RawLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidatesResponse {
    #[serde(default)]
    spatial_reference: Option<SpatialReference>,
    candidates: Vec<RawCandidate>,
}

#[derive(Debug, Deserialize)]
struct RawCandidate {
    #[serde(default)]
    address: String,
    #[serde(default)]
    location: Option<RawLocation>,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    attributes: Map<String, Value>,
}

/// The `{"error": {...}}` body ArcGIS returns alongside HTTP 200
#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<String>,
}

impl ServiceError {
    fn from_body(value: &Value) -> Option<ServiceError> {
        serde_json::from_value(value.get("error")?.clone()).ok()
    }

    fn is_no_match(&self) -> bool {
        self.details
            .iter()
            .chain(std::iter::once(&self.message))
            .any(|d| d.to_ascii_lowercase().contains("unable to find"))
    }

    fn into_error(self) -> Error {
        let mut message = self.message;
        if !self.details.is_empty() {
            message = format!("{} ({})", message, self.details.join("; "));
        }
        Error::Service {
            code: self.code,
            message,
        }
    }
}

fn string_attr(attributes: &Map<String, Value>, key: &str) -> Option<String> {
    attributes
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Client for the Maryland iMAP composite locator (an ArcGIS GeocodeServer).
///
/// Points enter reverse lookups in either system and are sent as EPSG:3857;
/// every result carries both the service's projected point and its
/// EPSG:4326 conversion.
pub struct GeocodeClient<T: Transport = ReqwestTransport> {
    transport: T,
    base_url: String,
    default_distance_m: f64,
    default_max_locations: u32,
}

impl GeocodeClient<ReqwestTransport> {
    pub fn new(config: &GeocoderConfig, timeout: Duration) -> Result<Self> {
        Self::with_transport(ReqwestTransport::new(timeout)?, config)
    }
}

impl<T: Transport> GeocodeClient<T> {
    pub fn with_transport(transport: T, config: &GeocoderConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| Error::InvalidInput(format!("invalid geocoder base URL {base_url}: {e}")))?;

        Ok(Self {
            transport,
            base_url,
            default_distance_m: config.reverse_distance_m,
            default_max_locations: config.max_locations,
        })
    }

    fn endpoint(&self, operation: &str, params: &[(&str, &str)]) -> Result<Url> {
        let url = format!("{}/{}", self.base_url, operation);
        Url::parse_with_params(&url, params)
            .map_err(|e| Error::InvalidInput(format!("invalid geocoder URL {url}: {e}")))
    }

    fn fetch_json(&self, request: HttpRequest) -> Result<Value> {
        let response = self.transport.execute(&request)?.error_for_status(SERVICE)?;
        serde_json::from_str(&response.body)
            .map_err(|e| Error::Parse(format!("{SERVICE} returned invalid JSON: {e}")))
    }

    /// Geocode a batch of addresses in one request.
    ///
    /// Unmatched records are left out, so the result may be shorter than the
    /// input. Results are ordered by record id.
    pub fn geocode_batch(&self, records: &[AddressRecord]) -> Result<Vec<GeocodeResult>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut submitted = HashSet::with_capacity(records.len());
        for record in records {
            if !submitted.insert(record.id) {
                return Err(Error::InvalidInput(format!(
                    "duplicate address id {} in batch",
                    record.id
                )));
            }
        }

        let payload = json!({
            "records": records.iter().map(AddressRecord::to_attributes).collect::<Vec<_>>()
        });
        let form = vec![
            ("addresses".to_string(), payload.to_string()),
            ("outSR".to_string(), OUT_SR.to_string()),
            ("f".to_string(), "json".to_string()),
        ];
        let url = self.endpoint("geocodeAddresses", &[])?;

        let body = self.fetch_json(HttpRequest::post_form(url, form))?;
        if let Some(err) = ServiceError::from_body(&body) {
            return Err(err.into_error());
        }

        let response: BatchResponse = serde_json::from_value(body)
            .map_err(|e| Error::Parse(format!("unexpected geocodeAddresses response: {e}")))?;
        let crs = response.spatial_reference.unwrap_or_default().crs()?;

        let mut results = Vec::with_capacity(response.locations.len());
        for location in response.locations {
            let Some(id) = location.result_id() else {
                warn!("dropping geocode location without a ResultID");
                continue;
            };
            if !submitted.contains(&id) {
                warn!(id, "dropping geocode location for an id that was never submitted");
                continue;
            }
            if location.is_unmatched() {
                debug!(id, "address did not match");
                continue;
            }
            let source = match &location.location {
                Some(raw) => raw.point(crs)?,
                None => None,
            };
            let Some(source) = source else {
                debug!(id, "matched address has no usable location");
                continue;
            };

            results.push(GeocodeResult {
                id,
                address: location.address(),
                score: location.score(),
                location: source.to_wgs84(),
                source_location: source,
            });
        }

        results.sort_by_key(|r| r.id);
        debug!(
            submitted = records.len(),
            matched = results.len(),
            "batch geocode complete"
        );
        Ok(results)
    }

    /// Find the nearest address to `point` within `radius_m` metres.
    ///
    /// Fails with [`Error::NotFound`] rather than returning a match outside the radius.
    pub fn reverse_geocode(&self, point: GeoPoint, radius_m: Option<f64>) -> Result<AddressCandidate> {
        let radius = radius_m.unwrap_or(self.default_distance_m);
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "search radius must be positive, got {radius}"
            )));
        }
        if !point.is_finite() {
            return Err(Error::InvalidInput("reverse geocode point is not finite".to_string()));
        }

        let query = point.to_web_mercator();
        let not_found = || Error::NotFound {
            x: query.x(),
            y: query.y(),
            radius_m: radius,
        };

        let location = format!("{},{}", query.x(), query.y());
        let distance_param = radius.to_string();
        let url = self.endpoint(
            "reverseGeocode",
            &[
                ("location", location.as_str()),
                ("distance", distance_param.as_str()),
                ("outSR", OUT_SR),
                ("f", "json"),
            ],
        )?;

        let body = self.fetch_json(HttpRequest::get(url))?;
        if let Some(err) = ServiceError::from_body(&body) {
            if err.is_no_match() {
                return Err(not_found());
            }
            return Err(err.into_error());
        }

        let response: ReverseResponse = serde_json::from_value(body)
            .map_err(|e| Error::Parse(format!("unexpected reverseGeocode response: {e}")))?;
        let Some(attributes) = response.address else {
            return Err(not_found());
        };
        let raw = response
            .location
            .ok_or_else(|| Error::Parse("reverseGeocode response has no location".to_string()))?;
        let Some(source) = raw.point(Crs::WebMercator)? else {
            return Err(not_found());
        };

        let distance = source.distance_m(&query);
        if distance > radius {
            debug!(distance, radius, "nearest address lies outside the search radius");
            return Err(not_found());
        }

        let address = string_attr(&attributes, "Match_addr")
            .or_else(|| string_attr(&attributes, "LongLabel"))
            .or_else(|| string_attr(&attributes, "Address"))
            .unwrap_or_default();

        Ok(AddressCandidate {
            address,
            score: None,
            location: source.to_wgs84(),
            source_location: source,
            attributes,
        })
    }

    /// Look up ranked candidates for a partial address, best score first.
    ///
    /// No candidates is a successful, empty result.
    pub fn find_candidates(
        &self,
        query: &PartialAddress,
        max_results: Option<u32>,
    ) -> Result<Vec<AddressCandidate>> {
        let max_locations = max_results.unwrap_or(self.default_max_locations).to_string();
        let mut params = query.params();
        if params.is_empty() {
            return Err(Error::InvalidInput(
                "candidate lookup needs at least one address field".to_string(),
            ));
        }

        params.extend([
            ("maxLocations", max_locations.as_str()),
            ("outFields", "*"),
            ("outSR", OUT_SR),
            ("f", "json"),
        ]);
        let url = self.endpoint("findAddressCandidates", &params)?;

        let body = self.fetch_json(HttpRequest::get(url))?;
        if let Some(err) = ServiceError::from_body(&body) {
            return Err(err.into_error());
        }

        let response: CandidatesResponse = serde_json::from_value(body)
            .map_err(|e| Error::Parse(format!("unexpected findAddressCandidates response: {e}")))?;
        let crs = response.spatial_reference.unwrap_or_default().crs()?;

        let mut candidates = Vec::with_capacity(response.candidates.len());
        for candidate in response.candidates {
            let source = match &candidate.location {
                Some(raw) => raw.point(crs)?,
                None => None,
            };
            let Some(source) = source else {
                continue;
            };
            candidates.push(AddressCandidate {
                address: candidate.address,
                score: Some(candidate.score),
                location: source.to_wgs84(),
                source_location: source,
                attributes: candidate.attributes,
            });
        }

        candidates.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .total_cmp(&a.score.unwrap_or(0.0))
        });
        debug!(count = candidates.len(), "candidate lookup complete");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::Method;
    use crate::api::transport::fake::FakeTransport;

    const PRATT_X: f64 = -8_527_629.59;
    const PRATT_Y: f64 = 4_762_808.11;

    fn client(transport: FakeTransport) -> GeocodeClient<FakeTransport> {
        GeocodeClient::with_transport(transport, &GeocoderConfig::default()).unwrap()
    }

    fn query_value(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn test_geocode_batch_pratt_street() {
        let body = format!(
            r#"{{
                "spatialReference": {{"wkid": 102100, "latestWkid": 3857}},
                "locations": [{{
                    "address": "501 E PRATT ST, BALTIMORE, 21202",
                    "location": {{"x": {PRATT_X}, "y": {PRATT_Y}}},
                    "score": 100,
                    "attributes": {{"ResultID": 1, "Status": "M", "Score": 100}}
                }}]
            }}"#
        );
        let client = client(FakeTransport::new().respond(200, &body));
        let records = vec![AddressRecord::structured(
            1,
            "501 E Pratt St",
            Some("Baltimore"),
            Some("21202"),
        )];

        let results = client.geocode_batch(&records).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);
        assert_eq!(results[0].score, 100.0);
        assert_eq!(results[0].location.crs, Crs::Wgs84);
        assert!((results[0].location.lat() - 39.28).abs() < 0.01);
        assert!((results[0].location.lon() - -76.60).abs() < 0.01);
        assert_eq!(results[0].source_location.crs, Crs::WebMercator);
        assert!((results[0].source_location.x() - PRATT_X).abs() < 1e-6);
    }

    #[test]
    fn test_geocode_batch_request_shape() {
        let transport = FakeTransport::new().respond(200, r#"{"locations": []}"#);
        let client = client(transport);
        let records = vec![
            AddressRecord::structured(1, "501 E Pratt St", Some("Baltimore"), Some("21202")),
            AddressRecord::single_line(2, "45 Calvert St, Annapolis, MD 21401"),
        ];

        client.geocode_batch(&records).unwrap();

        let requests = client.transport.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, Method::Post);
        assert!(request.url.path().ends_with("/GeocodeServer/geocodeAddresses"));
        assert_eq!(request.form_value("f"), Some("json"));
        assert_eq!(request.form_value("outSR"), Some("3857"));

        let addresses: Value = serde_json::from_str(request.form_value("addresses").unwrap()).unwrap();
        let sent = addresses["records"].as_array().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["attributes"]["OBJECTID"], 1);
        assert_eq!(sent[0]["attributes"]["Postal"], "21202");
        assert_eq!(
            sent[1]["attributes"]["SingleLine"],
            "45 Calvert St, Annapolis, MD 21401"
        );
    }

    #[test]
    fn test_geocode_batch_results_subset_of_submitted() {
        let body = r#"{
            "spatialReference": {"wkid": 102100},
            "locations": [
                {"address": "B", "location": {"x": -8528431.09, "y": 4763354.66}, "score": 92.5,
                 "attributes": {"ResultID": 3, "Status": "M"}},
                {"address": "", "location": {"x": "NaN", "y": "NaN"}, "score": 0,
                 "attributes": {"ResultID": 2, "Status": "U"}},
                {"address": "stray", "location": {"x": -8528431.09, "y": 4763354.66}, "score": 100,
                 "attributes": {"ResultID": 99, "Status": "M"}},
                {"address": "A", "location": {"x": -8527629.59, "y": 4762808.11}, "score": 100,
                 "attributes": {"ResultID": 1, "Status": "M"}}
            ]
        }"#;
        let client = client(FakeTransport::new().respond(200, body));
        let records: Vec<AddressRecord> = (1..=3)
            .map(|id| AddressRecord::single_line(id, format!("address {id}")))
            .collect();

        let results = client.geocode_batch(&records).unwrap();

        assert!(results.len() <= records.len());
        let ids: Vec<i64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(ids.iter().all(|id| records.iter().any(|r| r.id == *id)));
        assert_eq!(results[1].score, 92.5);
    }

    #[test]
    fn test_geocode_batch_empty_sends_nothing() {
        let client = client(FakeTransport::new());
        assert!(client.geocode_batch(&[]).unwrap().is_empty());
        assert!(client.transport.requests().is_empty());
    }

    #[test]
    fn test_geocode_batch_duplicate_ids() {
        let client = client(FakeTransport::new());
        let records = vec![
            AddressRecord::single_line(4, "a"),
            AddressRecord::single_line(4, "b"),
        ];

        let err = client.geocode_batch(&records).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(client.transport.requests().is_empty());
    }

    #[test]
    fn test_geocode_batch_missing_locations_is_parse_error() {
        let client = client(FakeTransport::new().respond(200, r#"{"spatialReference": {"wkid": 102100}}"#));
        let err = client
            .geocode_batch(&[AddressRecord::single_line(1, "x")])
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_geocode_batch_http_failure_is_transport_error() {
        let client = client(FakeTransport::new().respond(502, "Bad Gateway"));
        let err = client
            .geocode_batch(&[AddressRecord::single_line(1, "x")])
            .unwrap_err();
        assert!(matches!(err, Error::Transport(ref msg) if msg.contains("502")));
    }

    #[test]
    fn test_geocode_batch_timeout_is_transport_error() {
        let transport =
            FakeTransport::new().fail(Error::Transport("request timed out".to_string()));
        let client = client(transport);
        let err = client
            .geocode_batch(&[AddressRecord::single_line(1, "x")])
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_geocode_batch_service_error_envelope() {
        let body = r#"{"error": {"code": 498, "message": "Invalid Token", "details": []}}"#;
        let client = client(FakeTransport::new().respond(200, body));
        let err = client
            .geocode_batch(&[AddressRecord::single_line(1, "x")])
            .unwrap_err();
        assert!(matches!(err, Error::Service { code: 498, .. }));
    }

    #[test]
    fn test_reverse_geocode_converts_geographic_input() {
        let body = format!(
            r#"{{
                "address": {{"Match_addr": "501 E PRATT ST, BALTIMORE, 21202", "City": "BALTIMORE"}},
                "location": {{"x": {}, "y": {}, "spatialReference": {{"wkid": 102100, "latestWkid": 3857}}}}
            }}"#,
            PRATT_X + 20.0,
            PRATT_Y - 15.0
        );
        let client = client(FakeTransport::new().respond(200, &body));

        let candidate = client
            .reverse_geocode(GeoPoint::from_lat_lon(39.2866, -76.6050), Some(50.0))
            .unwrap();

        assert_eq!(candidate.address, "501 E PRATT ST, BALTIMORE, 21202");
        assert_eq!(candidate.score, None);
        assert_eq!(candidate.location.crs, Crs::Wgs84);
        assert_eq!(candidate.attributes["City"], "BALTIMORE");

        let requests = client.transport.requests();
        let request = &requests[0];
        assert_eq!(request.method, Method::Get);
        assert!(request.url.path().ends_with("/reverseGeocode"));
        assert_eq!(query_value(&request.url, "distance").as_deref(), Some("50"));
        assert_eq!(query_value(&request.url, "f").as_deref(), Some("json"));

        let location = query_value(&request.url, "location").unwrap();
        let (x, y) = location.split_once(',').unwrap();
        assert!((x.parse::<f64>().unwrap() - PRATT_X).abs() < 0.1);
        assert!((y.parse::<f64>().unwrap() - PRATT_Y).abs() < 0.1);
    }

    #[test]
    fn test_reverse_geocode_projected_input_sent_unchanged() {
        let body = format!(
            r#"{{"address": {{"Address": "501 E PRATT ST"}}, "location": {{"x": {PRATT_X}, "y": {PRATT_Y}}}}}"#
        );
        let client = client(FakeTransport::new().respond(200, &body));

        let candidate = client
            .reverse_geocode(GeoPoint::web_mercator(PRATT_X, PRATT_Y), None)
            .unwrap();
        assert_eq!(candidate.address, "501 E PRATT ST");

        let url = &client.transport.requests()[0].url;
        assert_eq!(
            query_value(url, "location").as_deref(),
            Some("-8527629.59,4762808.11")
        );
        assert_eq!(query_value(url, "distance").as_deref(), Some("100"));
    }

    #[test]
    fn test_reverse_geocode_no_match_is_not_found() {
        let body = r#"{"error": {"code": 400, "message": "Unable to complete operation.",
            "details": ["Unable to find address for the specified location."]}}"#;
        let client = client(FakeTransport::new().respond(200, body));

        // Middle of the Atlantic
        let err = client
            .reverse_geocode(GeoPoint::from_lat_lon(35.0, -60.0), Some(100.0))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { radius_m, .. } if radius_m == 100.0));
    }

    #[test]
    fn test_reverse_geocode_far_match_is_not_found() {
        // Service snapped to an address about 1 km away
        let body = format!(
            r#"{{"address": {{"Match_addr": "far away"}}, "location": {{"x": {PRATT_X}, "y": {}}}}}"#,
            PRATT_Y + 1300.0
        );
        let client = client(FakeTransport::new().respond(200, &body));

        let err = client
            .reverse_geocode(GeoPoint::web_mercator(PRATT_X, PRATT_Y), Some(100.0))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_reverse_geocode_rejects_bad_radius() {
        let client = client(FakeTransport::new());
        let err = client
            .reverse_geocode(GeoPoint::web_mercator(PRATT_X, PRATT_Y), Some(0.0))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(client.transport.requests().is_empty());
    }

    #[test]
    fn test_find_candidates_ranked() {
        let body = r#"{
            "spatialReference": {"wkid": 102100, "latestWkid": 3857},
            "candidates": [
                {"address": "501 E PRATT ST", "location": {"x": -8527629.59, "y": 4762808.11},
                 "score": 88.1, "attributes": {}},
                {"address": "501 E PRATT ST, BALTIMORE, 21202", "location": {"x": -8527630.0, "y": 4762808.0},
                 "score": 100, "attributes": {"Loc_name": "MD_Composite"}}
            ]
        }"#;
        let client = client(FakeTransport::new().respond(200, body));
        let query = PartialAddress::default()
            .with_address("501 E Pratt St")
            .with_city("Baltimore");

        let candidates = client.find_candidates(&query, Some(5)).unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].score, Some(100.0));
        assert_eq!(candidates[1].score, Some(88.1));
        assert!((candidates[0].location.lat() - 39.2866).abs() < 1e-3);

        let url = &client.transport.requests()[0].url;
        assert!(url.path().ends_with("/findAddressCandidates"));
        assert_eq!(query_value(url, "Address").as_deref(), Some("501 E Pratt St"));
        assert_eq!(query_value(url, "City").as_deref(), Some("Baltimore"));
        assert_eq!(query_value(url, "maxLocations").as_deref(), Some("5"));
        assert_eq!(query_value(url, "SingleLine"), None);
        assert_eq!(query_value(url, "Postal"), None);
    }

    #[test]
    fn test_find_candidates_empty_is_ok() {
        let body = r#"{"spatialReference": {"wkid": 102100}, "candidates": []}"#;
        let client = client(FakeTransport::new().respond(200, body));

        let candidates = client
            .find_candidates(&PartialAddress::single_line("nowhere at all"), None)
            .unwrap();
        assert!(candidates.is_empty());

        let url = &client.transport.requests()[0].url;
        assert_eq!(query_value(url, "SingleLine").as_deref(), Some("nowhere at all"));
        assert_eq!(query_value(url, "maxLocations").as_deref(), Some("10"));
    }

    #[test]
    fn test_find_candidates_requires_a_field() {
        let client = client(FakeTransport::new());
        let err = client
            .find_candidates(&PartialAddress::default(), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_find_candidates_unknown_spatial_reference() {
        let body = r#"{"spatialReference": {"wkid": 26985}, "candidates": []}"#;
        let client = client(FakeTransport::new().respond(200, body));
        let err = client
            .find_candidates(&PartialAddress::single_line("x"), None)
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_reverse_geocode_missing_address_is_not_found() {
        let body = format!(r#"{{"location": {{"x": {PRATT_X}, "y": {PRATT_Y}}}}}"#);
        let client = client(FakeTransport::new().respond(200, &body));

        let err = client
            .reverse_geocode(GeoPoint::web_mercator(PRATT_X, PRATT_Y), Some(100.0))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_reverse_geocode_geographic_location() {
        let body = r#"{
            "address": {"Match_addr": "501 E PRATT ST, BALTIMORE, 21202"},
            "location": {"x": -76.6050, "y": 39.2866, "spatialReference": {"wkid": 4326}}
        }"#;
        let client = client(FakeTransport::new().respond(200, body));

        let candidate = client
            .reverse_geocode(GeoPoint::from_lat_lon(39.2866, -76.6050), Some(10.0))
            .unwrap();

        assert_eq!(candidate.source_location.crs, Crs::Wgs84);
        assert_eq!(candidate.location.crs, Crs::Wgs84);
        assert!((candidate.location.lat() - 39.2866).abs() < 1e-9);
        assert!((candidate.location.lon() - -76.6050).abs() < 1e-9);
    }

    #[test]
    fn test_find_candidates_location_spatial_reference_wins() {
        let body = r#"{
            "spatialReference": {"wkid": 102100, "latestWkid": 3857},
            "candidates": [
                {"address": "501 E PRATT ST", "score": 100, "attributes": {},
                 "location": {"x": -76.6050, "y": 39.2866, "spatialReference": {"wkid": 4326}}}
            ]
        }"#;
        let client = client(FakeTransport::new().respond(200, body));

        let candidates = client
            .find_candidates(&PartialAddress::single_line("501 E Pratt St"), None)
            .unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].source_location.crs, Crs::Wgs84);
        assert!((candidates[0].location.lat() - 39.2866).abs() < 1e-9);
        assert!((candidates[0].location.lon() - -76.6050).abs() < 1e-9);
    }

    #[test]
    fn test_geocode_batch_location_spatial_reference_wins() {
        let body = r#"{
            "spatialReference": {"wkid": 102100},
            "locations": [
                {"address": "A", "score": 100, "attributes": {"ResultID": 1, "Status": "M"},
                 "location": {"x": -76.6050, "y": 39.2866, "spatialReference": {"wkid": 4326}}},
                {"address": "B", "score": 100, "attributes": {"ResultID": 2, "Status": "M"},
                 "location": {"x": -8527629.59, "y": 4762808.11}}
            ]
        }"#;
        let client = client(FakeTransport::new().respond(200, body));
        let records = vec![
            AddressRecord::single_line(1, "a"),
            AddressRecord::single_line(2, "b"),
        ];

        let results = client.geocode_batch(&records).unwrap();

        assert_eq!(results[0].source_location.crs, Crs::Wgs84);
        assert_eq!(results[1].source_location.crs, Crs::WebMercator);
        assert!((results[0].location.lat() - results[1].location.lat()).abs() < 1e-6);
        assert!((results[0].location.lon() - results[1].location.lon()).abs() < 1e-6);
    }

    #[test]
    fn test_geocode_batch_unknown_location_spatial_reference() {
        let body = r#"{
            "locations": [
                {"address": "A", "score": 100, "attributes": {"ResultID": 1, "Status": "M"},
                 "location": {"x": 1.0, "y": 2.0, "spatialReference": {"wkid": 26985}}}
            ]
        }"#;
        let client = client(FakeTransport::new().respond(200, body));
        let err = client
            .geocode_batch(&[AddressRecord::single_line(1, "a")])
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
