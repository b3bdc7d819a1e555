//! Background annotation queue
//!
//! Variant creation enqueues the new id and returns immediately. A single
//! worker task drains the bounded channel and annotates one variant at a
//! time. There is no retry: a failed pass is logged and dropped.

use super::AnnotationService;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Sending half of the annotation queue
#[derive(Clone)]
pub struct AnnotationQueue {
    tx: mpsc::Sender<i64>,
}

impl AnnotationQueue {
    /// Spawn the worker; it exits once every queue handle is dropped
    pub fn start(service: Arc<AnnotationService>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<i64>(capacity.max(1));

        let handle = tokio::spawn(async move {
            info!(providers = ?service.provider_sources(), "Annotation worker started");
            while let Some(variant_id) = rx.recv().await {
                match service.annotate(variant_id).await {
                    Ok(outcome) => debug!(
                        variant_id,
                        stored = ?outcome.stored,
                        failed = ?outcome.failed,
                        genes = outcome.genes_linked,
                        "Annotation pass finished"
                    ),
                    Err(e) => warn!(variant_id, error = %e, "Annotation pass failed"),
                }
            }
            info!("Annotation worker stopped");
        });

        (Self { tx }, handle)
    }

    /// Queue a variant; returns false (and logs) when the queue is full or closed
    pub fn enqueue(&self, variant_id: i64) -> bool {
        match self.tx.try_send(variant_id) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(variant_id, "Annotation queue full, variant not annotated");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(variant_id, "Annotation worker gone, variant not annotated");
                false
            }
        }
    }
}
