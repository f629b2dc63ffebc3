//! Location Worker
//!
//! Background task that reverse-geocodes precise locations after the
//! visitor's request has already been answered, and writes the address
//! back onto the trace.

use crate::domain::entities::TracePatch;
use crate::domain::ports::{LinkRepository, ReverseGeocoder};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One reverse-geocoding request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReverseGeocodeJob {
    pub link_id: String,
    pub access_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Sending side of the worker queue. Cheap to clone.
#[derive(Clone)]
pub struct LocationWorkerHandle {
    tx: mpsc::Sender<ReverseGeocodeJob>,
}

impl LocationWorkerHandle {
    /// Queue a job without waiting.
    ///
    /// Returns false when the queue is full or the worker has stopped; the
    /// job is dropped in that case.
    pub fn submit(&self, job: ReverseGeocodeJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::warn!(
                    "reverse geocoding queue full, dropping job for access {}",
                    job.access_id
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::warn!(
                    "reverse geocoding worker stopped, dropping job for access {}",
                    job.access_id
                );
                false
            }
        }
    }
}

/// Detached reverse-geocoding worker.
///
/// Jobs are processed one at a time in arrival order. The worker exits once
/// every `LocationWorkerHandle` has been dropped and the queue is drained.
pub struct LocationWorker;

impl LocationWorker {
    /// Spawn the worker task.
    pub fn spawn(
        geocoder: Arc<dyn ReverseGeocoder>,
        repo: Arc<dyn LinkRepository>,
        capacity: usize,
    ) -> (LocationWorkerHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<ReverseGeocodeJob>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                Self::process(&job, geocoder.as_ref(), repo.as_ref()).await;
            }
            tracing::debug!("reverse geocoding worker stopped");
        });

        (LocationWorkerHandle { tx }, handle)
    }

    async fn process(job: &ReverseGeocodeJob, geocoder: &dyn ReverseGeocoder, repo: &dyn LinkRepository) {
        let details = match geocoder.reverse(job.latitude, job.longitude).await {
            Ok(details) => details,
            Err(e) => {
                tracing::warn!(
                    "reverse geocoding failed for access {} ({}, {}): {}",
                    job.access_id,
                    job.latitude,
                    job.longitude,
                    e
                );
                return;
            }
        };

        match repo
            .update_trace(&job.link_id, &job.access_id, TracePatch::address_details(details))
            .await
        {
            Ok(true) => tracing::debug!("address details stored for access {}", job.access_id),
            Ok(false) => tracing::warn!(
                "trace {} vanished before address details arrived",
                job.access_id
            ),
            Err(e) => tracing::error!(
                "failed to store address details for access {}: {}",
                job.access_id,
                e
            ),
        }
    }
}
