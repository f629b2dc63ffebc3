mod geo_resolver;
mod link_repository;
mod reverse_geocoder;

pub use geo_resolver::{GeoResolver, LookupError};
pub use link_repository::{LinkRepository, StoreError};
pub use reverse_geocoder::ReverseGeocoder;
