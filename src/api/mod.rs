pub mod geocoder;
pub mod socrata;
pub mod soql;
pub mod transport;

pub use geocoder::GeocodeClient;
pub use socrata::{OpenDataClient, Row};
pub use soql::SoqlQuery;
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
