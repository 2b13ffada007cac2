//! Debounced, race-safe room alias availability checks.
//!
//! Every edit to the address field schedules a check one second out. Only the
//! most recent check may ever touch the validity state: scheduling a new one
//! aborts the previous timer, and both the timer firing and the service's
//! answer are re-validated against the live field before they are applied.
//! A timer that already fired may have its event queued in the channel, so
//! the abort alone is not enough.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, sleep};

use crate::error::ALIAS_CHECK_FAILED;
use crate::service::{RoomService, ServiceError};

/// How long the address must stay unchanged before it is checked.
pub const ALIAS_CHECK_DELAY: Duration = Duration::from_millis(1000);

// ── Validity ─────────────────────────────────────────────────────────────────

/// What we currently know about the candidate address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressStatus {
    /// Not checked yet (or edited since the last check).
    #[default]
    Unknown,
    Valid,
    Invalid,
}

/// `AddressStatus` plus the message explaining an `Invalid` verdict.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidityState {
    pub status: AddressStatus,
    pub error: Option<String>,
}

impl ValidityState {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            status: AddressStatus::Invalid,
            error: Some(message.into()),
        }
    }

    /// Turn a service answer for `alias` into a verdict.
    ///
    /// A failed query counts as `Invalid`.
    pub fn from_answer(alias: &str, answer: &Result<bool, ServiceError>) -> Self {
        match answer {
            Ok(true) => Self {
                status: AddressStatus::Valid,
                error: None,
            },
            Ok(false) => Self::invalid(format!("{alias} is already in use")),
            Err(_) => Self::invalid(ALIAS_CHECK_FAILED),
        }
    }
}

// ── Requests and events ──────────────────────────────────────────────────────

/// One scheduled check: the address as it was when the user typed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    /// Increases with every schedule; only the latest may be applied.
    pub seq: u64,
    pub address: String,
    pub scheduled_at: Instant,
}

/// Messages the checker's background tasks send back to the owner.
#[derive(Debug)]
pub enum CheckEvent {
    /// The debounce timer for this request elapsed.
    Due(CheckRequest),
    /// The service answered the availability query for this request.
    Answered {
        request: CheckRequest,
        result: Result<bool, ServiceError>,
    },
}

// ── Checker ──────────────────────────────────────────────────────────────────

/// Schedules availability checks and decides which results still matter.
///
/// The checker never mutates validity itself: it hands events back through
/// the owner's channel, and the owner (which holds the live field value) asks
/// `is_current` before acting on them.
#[derive(Debug)]
pub struct AliasChecker {
    /// Server part appended to the localpart: `#<address>:<server_name>`.
    server_name: String,
    latest: u64,
    timer: Option<JoinHandle<()>>,
}

impl AliasChecker {
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            latest: 0,
            timer: None,
        }
    }

    /// The full alias for a localpart, e.g. `#lobby:example.org`.
    pub fn full_alias(&self, address: &str) -> String {
        format!("#{address}:{}", self.server_name)
    }

    /// Forget any pending check. Events already in flight become stale.
    pub fn cancel(&mut self) {
        self.latest += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Schedule a check for `address` after `ALIAS_CHECK_DELAY`.
    ///
    /// Any pending check is cancelled first, even when `address` is unset.
    /// An empty field has nothing to check, so nothing new is scheduled.
    ///
    /// `E: From<CheckEvent>` lets the owner wrap our events in its own event
    /// enum, so one channel carries everything its background tasks report.
    pub fn schedule<E>(
        &mut self,
        address: Option<&str>,
        tx: &mpsc::Sender<E>,
    ) -> Option<CheckRequest>
    where
        E: From<CheckEvent> + Send + 'static,
    {
        self.cancel();
        let address = address.filter(|a| !a.is_empty())?;

        let request = CheckRequest {
            seq: self.latest,
            address: address.to_string(),
            scheduled_at: Instant::now(),
        };
        tracing::debug!(seq = request.seq, address, "alias check scheduled");

        let tx = tx.clone();
        let due = request.clone();
        self.timer = Some(tokio::spawn(async move {
            sleep(ALIAS_CHECK_DELAY).await;
            // The owner may be gone (dialog closed); nothing to report then.
            let _ = tx.send(CheckEvent::Due(due).into()).await;
        }));
        Some(request)
    }

    /// Whether `request` is the latest one and still matches the live field.
    pub fn is_current(&self, request: &CheckRequest, live: Option<&str>) -> bool {
        request.seq == self.latest && live == Some(request.address.as_str())
    }

    /// Ask the service about `request`'s alias in the background.
    ///
    /// The query is not cancellable; if the address changes meanwhile, the
    /// answer is simply dropped by `is_current` when it arrives.
    pub fn query<E>(
        &self,
        request: CheckRequest,
        service: Arc<dyn RoomService>,
        tx: &mpsc::Sender<E>,
    ) where
        E: From<CheckEvent> + Send + 'static,
    {
        let alias = self.full_alias(&request.address);
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = service.is_alias_available(&alias).await;
            if let Err(e) = &result {
                tracing::warn!(%alias, error = %e, "alias availability query failed");
            }
            let _ = tx.send(CheckEvent::Answered { request, result }.into()).await;
        });
    }
}

impl Drop for AliasChecker {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
