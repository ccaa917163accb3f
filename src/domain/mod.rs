pub mod address;
pub mod point;

pub use address::{AddressCandidate, AddressInput, AddressRecord, GeocodeResult, PartialAddress};
pub use point::{Crs, GeoPoint};
