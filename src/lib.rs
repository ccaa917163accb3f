//! mdgeo - Clients for the Maryland iMAP geocode service and Socrata open-data endpoints

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod geometry;
pub mod logging;

pub use api::{GeocodeClient, OpenDataClient, Row, SoqlQuery};
pub use domain::{AddressCandidate, AddressRecord, Crs, GeoPoint, GeocodeResult, PartialAddress};
pub use error::{Error, Result};
