pub mod address;
mod geo_chain;
mod heuristic;
pub mod masked_url;

pub use geo_chain::GeoChain;
pub use heuristic::heuristic_lookup;
pub use masked_url::{build_masked_url, MaskTemplate};
