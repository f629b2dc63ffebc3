//! Tracking Service - Main application use case
//!
//! Orchestrates link creation, visit recording and the later precise
//! location updates. This is the primary interface for the inbound adapter.

use crate::application::location_worker::{LocationWorkerHandle, ReverseGeocodeJob};
use crate::domain::entities::{AccessTrace, Link, PreciseLocation, TracePatch};
use crate::domain::ports::{LinkRepository, StoreError};
use crate::domain::services::masked_url::ensure_scheme;
use crate::domain::services::{build_masked_url, GeoChain, MaskTemplate};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Referer recorded when the visitor's browser sent none.
pub const DIRECT_REFERER: &str = "direct";

/// Errors returned by tracking use cases.
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("target URL must be an absolute http or https URL")]
    InvalidTarget,
    #[error("invalid coordinates: {0}")]
    InvalidLocation(String),
    #[error("link not found: {0}")]
    LinkNotFound(String),
    #[error("access not found: {0}")]
    AccessNotFound(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for TrackingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::LinkNotFound(id) => Self::LinkNotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Request to create a link.
#[derive(Debug, Clone, Default)]
pub struct NewLink {
    pub target_url: String,
    /// Masked URL template identifier; unknown values use the default
    pub template: Option<String>,
    /// Caller-supplied masked URL, wins over the template
    pub custom_mask: Option<String>,
}

/// What the inbound adapter knows about one visit.
#[derive(Debug, Clone, Default)]
pub struct Visit {
    pub ip: String,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

/// Tracking service - main application use case.
///
/// This service orchestrates:
/// 1. Creating links with their masked display URL
/// 2. Resolving visitor geo data and recording traces
/// 3. Attaching precise locations and queueing reverse geocoding
pub struct TrackingService {
    repo: Arc<dyn LinkRepository>,
    geo: GeoChain,
    locations: Option<LocationWorkerHandle>,
    default_template: MaskTemplate,
}

impl TrackingService {
    /// Create a new tracking service.
    pub fn new(
        repo: Arc<dyn LinkRepository>,
        geo: GeoChain,
        locations: Option<LocationWorkerHandle>,
        default_template: MaskTemplate,
    ) -> Self {
        Self {
            repo,
            geo,
            locations,
            default_template,
        }
    }

    /// Create and store a new link.
    ///
    /// `base_url` is the public origin used for generated masked URLs.
    pub async fn create_link(
        &self,
        req: NewLink,
        created_by: &str,
        base_url: &str,
    ) -> Result<Link, TrackingError> {
        let target = valid_target(&req.target_url).ok_or(TrackingError::InvalidTarget)?;

        let template = req
            .template
            .as_deref()
            .map(MaskTemplate::from_id)
            .unwrap_or(self.default_template);
        let masked_url = build_masked_url(
            base_url,
            template,
            req.custom_mask.as_deref(),
            &mut rand::thread_rng(),
        );

        let link = Link {
            id: Uuid::new_v4().to_string(),
            target_url: target,
            masked_url: Some(masked_url),
            template: Some(template.as_str().to_string()),
            created_at: Utc::now(),
            created_by: created_by.to_string(),
        };

        self.repo.put(link.clone()).await?;
        tracing::info!("created link {} -> {}", link.id, link.target_url);
        Ok(link)
    }

    /// Record a visit to a link.
    ///
    /// Geo resolution completes before the trace is stored; it never fails,
    /// so the only errors are an unknown link or a storage failure.
    pub async fn record_visit(
        &self,
        link_id: &str,
        visit: Visit,
    ) -> Result<(Link, AccessTrace), TrackingError> {
        let link = self
            .repo
            .get(link_id)
            .await?
            .ok_or_else(|| TrackingError::LinkNotFound(link_id.to_string()))?;

        let ip_info = self.geo.resolve(&visit.ip).await;

        let trace = AccessTrace {
            timestamp: Utc::now(),
            ip: visit.ip,
            ip_info,
            user_agent: visit.user_agent.filter(|ua| !ua.is_empty()),
            referer: visit
                .referer
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DIRECT_REFERER.to_string()),
            access_id: Uuid::new_v4().to_string(),
            precise_location: None,
            address_details: None,
        };

        self.repo.append_trace(link_id, trace.clone()).await?;
        tracing::debug!(
            "visit {} on link {} from {} ({})",
            trace.access_id,
            link_id,
            trace.ip,
            trace.ip_info.location
        );

        Ok((link, trace))
    }

    /// Attach a browser-supplied location to a recorded visit and queue
    /// reverse geocoding for it.
    pub async fn update_location(
        &self,
        link_id: &str,
        access_id: &str,
        location: PreciseLocation,
    ) -> Result<(), TrackingError> {
        if !(-90.0..=90.0).contains(&location.latitude)
            || !(-180.0..=180.0).contains(&location.longitude)
        {
            return Err(TrackingError::InvalidLocation(format!(
                "{}, {}",
                location.latitude, location.longitude
            )));
        }

        let (latitude, longitude) = (location.latitude, location.longitude);
        let updated = self
            .repo
            .update_trace(link_id, access_id, TracePatch::precise_location(location))
            .await?;
        if !updated {
            return Err(TrackingError::AccessNotFound(access_id.to_string()));
        }

        if let Some(locations) = &self.locations {
            locations.submit(ReverseGeocodeJob {
                link_id: link_id.to_string(),
                access_id: access_id.to_string(),
                latitude,
                longitude,
            });
        }

        tracing::debug!("precise location stored for access {}", access_id);
        Ok(())
    }

    /// A link with every visit recorded against it.
    pub async fn history(&self, link_id: &str) -> Result<(Link, Vec<AccessTrace>), TrackingError> {
        let link = self
            .repo
            .get(link_id)
            .await?
            .ok_or_else(|| TrackingError::LinkNotFound(link_id.to_string()))?;
        let traces = self.repo.traces(link_id).await?;
        Ok((link, traces))
    }

    /// All links, oldest first.
    pub async fn list_links(&self) -> Result<Vec<Link>, TrackingError> {
        Ok(self.repo.list().await?)
    }

    /// Number of stored links.
    pub async fn link_count(&self) -> Result<usize, TrackingError> {
        Ok(self.repo.count().await?)
    }
}

/// Normalize a creator-supplied target to an absolute http(s) URL.
///
/// The result is later sent verbatim as a `Location` header, so whitespace
/// and control characters are refused rather than stripped by the parser.
fn valid_target(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return None;
    }

    let target = ensure_scheme(raw);
    let url = reqwest::Url::parse(&target).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().map_or(true, str::is_empty) {
        return None;
    }
    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::DashMapLinkRepository;
    use crate::application::location_worker::LocationWorker;
    use crate::domain::entities::{AddressDetails, GeoResult, LOCATION_LOCAL};
    use crate::domain::ports::{GeoResolver, LookupError, ReverseGeocoder};
    use async_trait::async_trait;

    struct FixedResolver;

    #[async_trait]
    impl GeoResolver for FixedResolver {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn lookup(&self, ip: &str) -> Result<GeoResult, LookupError> {
            Ok(GeoResult::from_provider(ip, "fixed", "Porto, Porto, Portugal".into()))
        }
    }

    struct FixedGeocoder;

    #[async_trait]
    impl ReverseGeocoder for FixedGeocoder {
        async fn reverse(&self, _lat: f64, _lon: f64) -> Result<AddressDetails, LookupError> {
            Ok(AddressDetails {
                road: Some("Rua das Flores".into()),
                ..Default::default()
            })
        }
    }

    fn service() -> (TrackingService, Arc<DashMapLinkRepository>) {
        let repo = Arc::new(DashMapLinkRepository::new());
        let chain = GeoChain::new(vec![Arc::new(FixedResolver)]);
        let svc = TrackingService::new(repo.clone(), chain, None, MaskTemplate::News);
        (svc, repo)
    }

    fn new_link(target: &str) -> NewLink {
        NewLink {
            target_url: target.to_string(),
            ..Default::default()
        }
    }

    // ===== create_link =====

    #[tokio::test]
    async fn test_create_link_stores_link() {
        let (svc, repo) = service();
        let link = svc
            .create_link(new_link("example.com/page"), "203.0.113.1", "http://short.test")
            .await
            .unwrap();

        assert_eq!(link.target_url, "https://example.com/page");
        assert_eq!(link.created_by, "203.0.113.1");
        assert_eq!(link.template.as_deref(), Some("news"));
        assert!(link.masked_url.unwrap().starts_with("http://short.test/article/"));
        assert!(repo.get(&link.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_link_rejects_blank_target() {
        let (svc, _) = service();
        let err = svc.create_link(new_link("   "), "x", "http://h").await.unwrap_err();
        assert!(matches!(err, TrackingError::InvalidTarget));
    }

    #[tokio::test]
    async fn test_create_link_nested_url_keeps_absolute_target() {
        let (svc, _) = service();
        let link = svc
            .create_link(new_link("example.com/go?next=https://other.example"), "x", "h")
            .await
            .unwrap();
        assert_eq!(link.target_url, "https://example.com/go?next=https://other.example");
    }

    #[tokio::test]
    async fn test_create_link_rejects_unusable_targets() {
        let (svc, repo) = service();
        for target in [
            "https://a.example/x\ny",
            "https://a.example/x\r\nSet-Cookie: a=b",
            "https://a.example/\u{7f}",
            "ftp://files.example/a",
            "javascript://alert(1)",
            "https://",
            "http://exa mple.com",
        ] {
            let err = svc.create_link(new_link(target), "x", "h").await.unwrap_err();
            assert!(matches!(err, TrackingError::InvalidTarget), "{:?}", target);
        }
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_link_custom_mask_and_template() {
        let (svc, _) = service();
        let link = svc
            .create_link(
                NewLink {
                    target_url: "https://example.com".into(),
                    template: Some("shop".into()),
                    custom_mask: Some("deals.example/today".into()),
                },
                "x",
                "http://h",
            )
            .await
            .unwrap();

        assert_eq!(link.masked_url.as_deref(), Some("https://deals.example/today"));
        assert_eq!(link.template.as_deref(), Some("shop"));
    }

    #[tokio::test]
    async fn test_link_ids_are_unique() {
        let (svc, _) = service();
        let a = svc.create_link(new_link("a.example"), "x", "h").await.unwrap();
        let b = svc.create_link(new_link("a.example"), "x", "h").await.unwrap();
        assert_ne!(a.id, b.id);
    }

    // ===== record_visit =====

    #[tokio::test]
    async fn test_record_visit_resolves_and_stores() {
        let (svc, repo) = service();
        let link = svc.create_link(new_link("example.com"), "x", "h").await.unwrap();

        let (_, trace) = svc
            .record_visit(
                &link.id,
                Visit {
                    ip: "200.10.10.10".into(),
                    user_agent: Some("Mozilla/5.0".into()),
                    referer: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(trace.ip_info.location, "Porto, Porto, Portugal");
        assert_eq!(trace.referer, DIRECT_REFERER);
        assert!(trace.precise_location.is_none());

        let stored = repo.traces(&link.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].access_id, trace.access_id);
    }

    #[tokio::test]
    async fn test_record_visit_local_address() {
        let (svc, _) = service();
        let link = svc.create_link(new_link("example.com"), "x", "h").await.unwrap();
        let (_, trace) = svc
            .record_visit(&link.id, Visit { ip: "::1".into(), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(trace.ip_info.location, LOCATION_LOCAL);
    }

    #[tokio::test]
    async fn test_record_visit_unknown_link() {
        let (svc, _) = service();
        let err = svc.record_visit("missing", Visit::default()).await.unwrap_err();
        assert!(matches!(err, TrackingError::LinkNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_each_visit_gets_its_own_access_id() {
        let (svc, _) = service();
        let link = svc.create_link(new_link("example.com"), "x", "h").await.unwrap();
        let (_, a) = svc.record_visit(&link.id, Visit::default()).await.unwrap();
        let (_, b) = svc.record_visit(&link.id, Visit::default()).await.unwrap();
        assert_ne!(a.access_id, b.access_id);
    }

    // ===== update_location =====

    #[tokio::test]
    async fn test_update_location_patches_trace() {
        let (svc, repo) = service();
        let link = svc.create_link(new_link("example.com"), "x", "h").await.unwrap();
        let (_, trace) = svc.record_visit(&link.id, Visit::default()).await.unwrap();

        svc.update_location(&link.id, &trace.access_id, PreciseLocation::new(41.14, -8.61))
            .await
            .unwrap();

        let stored = &repo.traces(&link.id).await.unwrap()[0];
        assert_eq!(stored.precise_location.as_ref().unwrap().latitude, 41.14);
    }

    #[tokio::test]
    async fn test_update_location_unknown_access() {
        let (svc, _) = service();
        let link = svc.create_link(new_link("example.com"), "x", "h").await.unwrap();
        let err = svc
            .update_location(&link.id, "ghost", PreciseLocation::new(0.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackingError::AccessNotFound(_)));
    }

    #[tokio::test]
    async fn test_update_location_unknown_link() {
        let (svc, _) = service();
        let err = svc
            .update_location("ghost", "a", PreciseLocation::new(0.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackingError::LinkNotFound(_)));
    }

    #[tokio::test]
    async fn test_update_location_rejects_out_of_range() {
        let (svc, _) = service();
        let err = svc
            .update_location("l", "a", PreciseLocation::new(91.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackingError::InvalidLocation(_)));

        let err = svc
            .update_location("l", "a", PreciseLocation::new(f64::NAN, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackingError::InvalidLocation(_)));
    }

    #[tokio::test]
    async fn test_update_location_queues_reverse_geocoding() {
        let repo = Arc::new(DashMapLinkRepository::new());
        let (handle, join) = LocationWorker::spawn(Arc::new(FixedGeocoder), repo.clone(), 4);
        let svc = TrackingService::new(repo.clone(), GeoChain::default(), Some(handle), MaskTemplate::News);

        let link = svc.create_link(new_link("example.com"), "x", "h").await.unwrap();
        let (_, trace) = svc.record_visit(&link.id, Visit::default()).await.unwrap();
        svc.update_location(&link.id, &trace.access_id, PreciseLocation::new(41.14, -8.61))
            .await
            .unwrap();

        // Dropping the service drops the only handle, letting the worker drain
        drop(svc);
        join.await.unwrap();

        let stored = &repo.traces(&link.id).await.unwrap()[0];
        assert_eq!(
            stored.address_details.as_ref().unwrap().road.as_deref(),
            Some("Rua das Flores")
        );
    }

    // ===== history / list =====

    #[tokio::test]
    async fn test_history_and_list() {
        let (svc, _) = service();
        let link = svc.create_link(new_link("example.com"), "x", "h").await.unwrap();
        svc.record_visit(&link.id, Visit::default()).await.unwrap();

        let (got, traces) = svc.history(&link.id).await.unwrap();
        assert_eq!(got.id, link.id);
        assert_eq!(traces.len(), 1);

        assert_eq!(svc.list_links().await.unwrap().len(), 1);
        assert_eq!(svc.link_count().await.unwrap(), 1);
        assert!(matches!(
            svc.history("nope").await.unwrap_err(),
            TrackingError::LinkNotFound(_)
        ));
    }
}
