pub mod projection;

pub use projection::{ground_distance, to_web_mercator, to_wgs84};
