mod dashmap_link_repo;
mod http_geo_resolvers;
mod nominatim_reverse_geocoder;
mod sqlite_link_repo;

pub use dashmap_link_repo::DashMapLinkRepository;
pub use http_geo_resolvers::{
    build_client, standard_resolvers, AbstractApiResolver, GeolocationDbResolver,
    IpApiCoResolver, IpApiComResolver, IpInfoResolver,
};
pub use nominatim_reverse_geocoder::NominatimReverseGeocoder;
pub use sqlite_link_repo::SqliteLinkRepository;
