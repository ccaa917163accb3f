use geo::Point;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::projection;

/// Coordinate reference systems the clients understand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crs {
    /// EPSG:3857, spherical Web Mercator in metres
    WebMercator,
    /// EPSG:4326, x = longitude, y = latitude in degrees
    Wgs84,
}

impl Crs {
    /// Map an ArcGIS `spatialReference.wkid` onto a known system.
    ///
    /// Esri publishes Web Mercator under several historical ids.
    pub fn from_wkid(wkid: u32) -> Result<Crs> {
        match wkid {
            3857 | 102100 | 102113 | 900913 => Ok(Crs::WebMercator),
            4326 => Ok(Crs::Wgs84),
            other => Err(Error::Parse(format!(
                "unsupported spatial reference wkid {other}"
            ))),
        }
    }
}

/// An (x, y) pair tagged with its coordinate reference system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub point: Point<f64>,
    pub crs: Crs,
}

impl GeoPoint {
    pub fn new(x: f64, y: f64, crs: Crs) -> Self {
        Self {
            point: Point::new(x, y),
            crs,
        }
    }

    /// A geographic point from latitude and longitude in degrees
    pub fn from_lat_lon(lat: f64, lon: f64) -> Self {
        Self::new(lon, lat, Crs::Wgs84)
    }

    /// A projected point in Web Mercator metres
    pub fn web_mercator(x: f64, y: f64) -> Self {
        Self::new(x, y, Crs::WebMercator)
    }

    pub fn x(&self) -> f64 {
        self.point.x()
    }

    pub fn y(&self) -> f64 {
        self.point.y()
    }

    /// Latitude in degrees, converting from the projected system if needed
    pub fn lat(&self) -> f64 {
        self.to_wgs84().y()
    }

    /// Longitude in degrees, converting from the projected system if needed
    pub fn lon(&self) -> f64 {
        self.to_wgs84().x()
    }

    pub fn to_web_mercator(self) -> GeoPoint {
        match self.crs {
            Crs::WebMercator => self,
            Crs::Wgs84 => {
                let (x, y) = projection::to_web_mercator(self.x(), self.y());
                GeoPoint::web_mercator(x, y)
            }
        }
    }

    pub fn to_wgs84(self) -> GeoPoint {
        match self.crs {
            Crs::Wgs84 => self,
            Crs::WebMercator => {
                let (lon, lat) = projection::to_wgs84(self.x(), self.y());
                GeoPoint::from_lat_lon(lat, lon)
            }
        }
    }

    /// Approximate ground distance in metres, in whichever systems the points use
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let a = self.to_web_mercator();
        let b = other.to_web_mercator();
        projection::ground_distance((a.x(), a.y()), (b.x(), b.y()))
    }

    pub fn is_finite(&self) -> bool {
        self.x().is_finite() && self.y().is_finite()
    }
}
