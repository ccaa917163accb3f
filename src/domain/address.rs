use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::GeoPoint;

/// The address portion of a batch record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AddressInput {
    Structured {
        street: String,
        #[serde(default)]
        city: Option<String>,
        #[serde(default, alias = "zip")]
        postal: Option<String>,
    },
    SingleLine {
        single_line: String,
    },
}

/// One address submitted for batch geocoding
///
/// `id` is chosen by the caller and must be unique within a batch; it is the
/// only thing that ties a [`GeocodeResult`] back to its record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub id: i64,
    #[serde(flatten)]
    pub input: AddressInput,
}

impl AddressRecord {
    pub fn structured(
        id: i64,
        street: impl Into<String>,
        city: Option<&str>,
        postal: Option<&str>,
    ) -> Self {
        Self {
            id,
            input: AddressInput::Structured {
                street: street.into(),
                city: city.map(str::to_string),
                postal: postal.map(str::to_string),
            },
        }
    }

    pub fn single_line(id: i64, line: impl Into<String>) -> Self {
        Self {
            id,
            input: AddressInput::SingleLine {
                single_line: line.into(),
            },
        }
    }

    /// The `attributes` object the GeocodeServer expects for one record
    pub(crate) fn to_attributes(&self) -> Value {
        let mut attributes = Map::new();
        attributes.insert("OBJECTID".to_string(), json!(self.id));

        match &self.input {
            AddressInput::Structured {
                street,
                city,
                postal,
            } => {
                attributes.insert("Address".to_string(), json!(street));
                if let Some(city) = city {
                    attributes.insert("City".to_string(), json!(city));
                }
                if let Some(postal) = postal {
                    attributes.insert("Postal".to_string(), json!(postal));
                }
            }
            AddressInput::SingleLine { single_line } => {
                attributes.insert("SingleLine".to_string(), json!(single_line));
            }
        }

        json!({ "attributes": attributes })
    }
}

/// A batch match correlated back to its [`AddressRecord`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeResult {
    pub id: i64,
    pub address: String,
    /// Match score, 0 to 100
    pub score: f64,
    /// Geographic (EPSG:4326) position
    pub location: GeoPoint,
    /// Position exactly as the service returned it
    pub source_location: GeoPoint,
}

/// An address returned by a reverse or candidate lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressCandidate {
    pub address: String,
    /// Present for candidate lookups; reverse lookups are unscored
    pub score: Option<f64>,
    pub location: GeoPoint,
    pub source_location: GeoPoint,
    pub attributes: Map<String, Value>,
}

/// Loose address fields for a candidate lookup; any subset may be set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialAddress {
    pub single_line: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal: Option<String>,
}

impl PartialAddress {
    pub fn single_line(line: impl Into<String>) -> Self {
        Self {
            single_line: Some(line.into()),
            ..Self::default()
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn with_postal(mut self, postal: impl Into<String>) -> Self {
        self.postal = Some(postal.into());
        self
    }

    /// Non-blank fields as (service parameter, value) pairs
    pub(crate) fn params(&self) -> Vec<(&'static str, &str)> {
        [
            ("SingleLine", &self.single_line),
            ("Address", &self.address),
            ("City", &self.city),
            ("Postal", &self.postal),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        })
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.params().is_empty()
    }
}
