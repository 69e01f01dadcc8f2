//! Denial audit hook.
//!
//! # Purpose
//! Every denial raised by [`crate::guard::AccessGuard`] is handed to an
//! [`AuditSink`] before the error reaches the caller. Persisting the events
//! is the host's business; the sinks here log them, forward them over a
//! channel, or drop them.
//!
//! # Key invariants
//! - `record` never blocks. [`ChannelAuditSink`] uses `try_send`.
//! - A failing sink never changes the decision. The guard logs the error,
//!   bumps `warden_audit_sink_failures_total` and returns the original denial.
use crate::guard::DenialKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use warden_authz::{EntityId, UserId};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit channel full")]
    ChannelFull,
    #[error("audit channel closed")]
    ChannelClosed,
    #[error("audit sink failed: {0}")]
    Sink(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DenialEvent {
    pub timestamp: DateTime<Utc>,
    pub domain: &'static str,
    pub user_id: UserId,
    pub entity_id: EntityId,
    /// Permission that was required, or `access` for a bare membership check.
    pub action: String,
    pub reason: DenialKind,
    /// The caller's resolved role on the entity, when one was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: &DenialEvent) -> Result<(), AuditError>;
}

/// Emits each denial as a structured `tracing` event on `warden::audit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &DenialEvent) -> Result<(), AuditError> {
        tracing::info!(
            target: "warden::audit",
            domain = event.domain,
            user_id = %event.user_id,
            entity_id = %event.entity_id,
            action = %event.action,
            reason = %event.reason,
            role = event.role.as_deref().unwrap_or("-"),
            timestamp = %event.timestamp.to_rfc3339(),
            "authorization denied"
        );
        Ok(())
    }
}

/// Forwards denials to a bounded channel for an out-of-band writer.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    tx: mpsc::Sender<DenialEvent>,
}

impl ChannelAuditSink {
    /// A `capacity` of zero is raised to one.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DenialEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: mpsc::Sender<DenialEvent>) -> Self {
        Self { tx }
    }
}

impl AuditSink for ChannelAuditSink {
    fn record(&self, event: &DenialEvent) -> Result<(), AuditError> {
        self.tx.try_send(event.clone()).map_err(|err| match err {
            TrySendError::Full(_) => AuditError::ChannelFull,
            TrySendError::Closed(_) => AuditError::ChannelClosed,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &DenialEvent) -> Result<(), AuditError> {
        Ok(())
    }
}
