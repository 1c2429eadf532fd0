//! Confirmation gate
//!
//! Holds write tool calls suspended between interception and an
//! external decision. Each pending entry carries a one-shot release
//! ticket: the first terminal transition (accept, reject or expiry)
//! consumes it, and any later resolution for the same correlation id is
//! a no-op that reports the recorded outcome. All transitions happen
//! under one lock, so a decision racing an expiry sweep can never
//! release the same entry twice.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use centavo_domain::{
    ConfirmationDecision, ConfirmationState, PendingConfirmation, Resolution, ValidatedToolCall,
};

#[derive(Debug, Error)]
pub enum GateError {
    #[error("no pending confirmation for correlation id: {0}")]
    UnknownCorrelation(String),
}

struct GateEntry {
    pending: PendingConfirmation,
    state: ConfirmationState,
    /// Release ticket; `take()` on first terminal transition
    ticket: Option<oneshot::Sender<Resolution>>,
}

impl GateEntry {
    fn recorded_resolution(&self) -> Option<Resolution> {
        match self.state {
            ConfirmationState::Pending => None,
            ConfirmationState::Accepted => Some(Resolution::Accepted),
            ConfirmationState::Rejected => Some(Resolution::Rejected),
            ConfirmationState::Expired => Some(Resolution::Expired),
        }
    }

    /// Terminal transition. Must only be called while holding the gate
    /// lock; returns the recorded outcome if already terminal.
    fn transition(&mut self, resolution: Resolution) -> Resolution {
        if let Some(recorded) = self.recorded_resolution() {
            return recorded;
        }
        self.state = resolution.state();
        if let Some(ticket) = self.ticket.take() {
            // Receiver may already be gone (loop cancelled); fine.
            let _ = ticket.send(resolution);
        }
        resolution
    }
}

/// In-process confirmation gate with TTL-based expiry.
pub struct ConfirmationGate {
    entries: Mutex<HashMap<String, GateEntry>>,
    ttl: Duration,
    /// Frontends subscribe here to learn about new pending entries.
    requests: mpsc::UnboundedSender<PendingConfirmation>,
}

impl ConfirmationGate {
    /// Create a gate and the request feed a frontend listens on.
    pub fn new(ttl: Duration) -> (Self, mpsc::UnboundedReceiver<PendingConfirmation>) {
        let (requests, feed) = mpsc::unbounded_channel();
        (
            Self {
                entries: Mutex::new(HashMap::new()),
                ttl,
                requests,
            },
            feed,
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Suspend a validated write call. Returns the pending record and
    /// the ticket the caller awaits for the decision.
    pub fn request(
        &self,
        call: ValidatedToolCall,
        message: impl Into<String>,
    ) -> (PendingConfirmation, oneshot::Receiver<Resolution>) {
        let pending = PendingConfirmation::new(call, message, self.ttl);
        let (ticket, receiver) = oneshot::channel();

        let mut entries = self.entries.lock().expect("gate lock poisoned");
        entries.insert(
            pending.correlation_id.clone(),
            GateEntry {
                pending: pending.clone(),
                state: ConfirmationState::Pending,
                ticket: Some(ticket),
            },
        );
        drop(entries);

        info!(
            correlation_id = %pending.correlation_id,
            tool = %pending.tool_call.tool_name,
            expires_at = %pending.expires_at,
            "confirmation pending"
        );
        // Nobody listening is fine; the ticket still resolves the call.
        let _ = self.requests.send(pending.clone());
        (pending, receiver)
    }

    /// Apply an external decision.
    ///
    /// A decision arriving after the entry expired resolves to
    /// `Expired`, and a repeat decision returns whatever was recorded
    /// first — the release happens at most once either way.
    pub fn resolve(
        &self,
        correlation_id: &str,
        decision: ConfirmationDecision,
    ) -> Result<Resolution, GateError> {
        let mut entries = self.entries.lock().expect("gate lock poisoned");
        let entry = entries
            .get_mut(correlation_id)
            .ok_or_else(|| GateError::UnknownCorrelation(correlation_id.to_string()))?;

        if let Some(recorded) = entry.recorded_resolution() {
            debug!(correlation_id, ?recorded, "duplicate resolution ignored");
            return Ok(recorded);
        }

        let resolution = if entry.pending.is_expired(Utc::now()) {
            warn!(correlation_id, "decision arrived after expiry");
            entry.transition(Resolution::Expired)
        } else {
            let resolution = match decision {
                ConfirmationDecision::Accept => Resolution::Accepted,
                ConfirmationDecision::Reject => Resolution::Rejected,
            };
            entry.transition(resolution)
        };
        info!(correlation_id, ?resolution, "confirmation resolved");
        Ok(resolution)
    }

    /// Force-expire one entry (called when its await deadline elapses).
    /// Returns the recorded outcome if a decision won the race.
    pub fn expire(&self, correlation_id: &str) -> Result<Resolution, GateError> {
        let mut entries = self.entries.lock().expect("gate lock poisoned");
        let entry = entries
            .get_mut(correlation_id)
            .ok_or_else(|| GateError::UnknownCorrelation(correlation_id.to_string()))?;
        Ok(entry.transition(Resolution::Expired))
    }

    /// Expire every overdue pending entry. Returns the ids swept.
    pub fn expire_overdue(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut entries = self.entries.lock().expect("gate lock poisoned");
        let mut swept = Vec::new();
        for (id, entry) in entries.iter_mut() {
            if entry.state == ConfirmationState::Pending && entry.pending.is_expired(now) {
                entry.transition(Resolution::Expired);
                swept.push(id.clone());
            }
        }
        if !swept.is_empty() {
            info!(count = swept.len(), "expired overdue confirmations");
        }
        swept
    }

    /// Currently pending entries, oldest first (for UI listings).
    pub fn pending(&self) -> Vec<PendingConfirmation> {
        let entries = self.entries.lock().expect("gate lock poisoned");
        let mut pending: Vec<_> = entries
            .values()
            .filter(|e| e.state == ConfirmationState::Pending)
            .map(|e| e.pending.clone())
            .collect();
        pending.sort_by(|a, b| {
            (a.created_at, &a.correlation_id).cmp(&(b.created_at, &b.correlation_id))
        });
        pending
    }

    /// Recorded state for a correlation id, if the gate has seen it.
    pub fn state_of(&self, correlation_id: &str) -> Option<ConfirmationState> {
        let entries = self.entries.lock().expect("gate lock poisoned");
        entries.get(correlation_id).map(|e| e.state)
    }

    /// Drop terminal entries (called between runs to bound memory).
    pub fn prune_resolved(&self) {
        let mut entries = self.entries.lock().expect("gate lock poisoned");
        entries.retain(|_, e| e.state == ConfirmationState::Pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use centavo_domain::ValidatedArgs;

    fn call(id: &str) -> ValidatedToolCall {
        ValidatedToolCall::new(id, "create_expense", ValidatedArgs::default())
    }

    fn gate() -> (ConfirmationGate, mpsc::UnboundedReceiver<PendingConfirmation>) {
        ConfirmationGate::new(Duration::minutes(5))
    }

    #[tokio::test]
    async fn accept_releases_the_ticket_once() {
        let (gate, mut feed) = gate();
        let (pending, ticket) = gate.request(call("toolu_1"), "Registrar gasto?");
        assert_eq!(pending.correlation_id, "toolu_1");
        assert_eq!(feed.recv().await.unwrap().correlation_id, "toolu_1");

        let resolution = gate
            .resolve("toolu_1", ConfirmationDecision::Accept)
            .unwrap();
        assert_eq!(resolution, Resolution::Accepted);
        assert_eq!(ticket.await.unwrap(), Resolution::Accepted);
        assert_eq!(gate.state_of("toolu_1"), Some(ConfirmationState::Accepted));
    }

    #[tokio::test]
    async fn duplicate_decision_is_a_noop_reporting_the_first() {
        let (gate, _feed) = gate();
        let (_, ticket) = gate.request(call("toolu_1"), "Registrar gasto?");

        gate.resolve("toolu_1", ConfirmationDecision::Accept)
            .unwrap();
        // Second decision, opposite direction: no state change.
        let second = gate
            .resolve("toolu_1", ConfirmationDecision::Reject)
            .unwrap();
        assert_eq!(second, Resolution::Accepted);
        assert_eq!(gate.state_of("toolu_1"), Some(ConfirmationState::Accepted));
        assert_eq!(ticket.await.unwrap(), Resolution::Accepted);
    }

    #[tokio::test]
    async fn reject_resolves_without_execution_permission() {
        let (gate, _feed) = gate();
        let (_, ticket) = gate.request(call("toolu_1"), "Registrar gasto?");
        gate.resolve("toolu_1", ConfirmationDecision::Reject)
            .unwrap();
        let resolution = ticket.await.unwrap();
        assert!(!resolution.allows_execution());
    }

    #[tokio::test]
    async fn decision_after_expiry_resolves_expired() {
        let (gate, _feed) = ConfirmationGate::new(Duration::zero());
        let (_, ticket) = gate.request(call("toolu_1"), "Registrar gasto?");

        // TTL of zero: already past its deadline.
        let resolution = gate
            .resolve("toolu_1", ConfirmationDecision::Accept)
            .unwrap();
        assert_eq!(resolution, Resolution::Expired);
        assert_eq!(ticket.await.unwrap(), Resolution::Expired);
    }

    #[tokio::test]
    async fn expire_loses_to_an_earlier_decision() {
        let (gate, _feed) = gate();
        let (_, _ticket) = gate.request(call("toolu_1"), "Registrar gasto?");
        gate.resolve("toolu_1", ConfirmationDecision::Accept)
            .unwrap();

        let outcome = gate.expire("toolu_1").unwrap();
        assert_eq!(outcome, Resolution::Accepted);
    }

    #[test]
    fn unknown_correlation_id_is_an_error() {
        let (gate, _feed) = gate();
        let err = gate
            .resolve("toolu_missing", ConfirmationDecision::Accept)
            .unwrap_err();
        assert!(matches!(err, GateError::UnknownCorrelation(_)));
    }

    #[tokio::test]
    async fn sweep_expires_only_overdue_entries() {
        let (gate, _feed) = gate();
        let (pending, _t1) = gate.request(call("toolu_1"), "a?");
        // Space the deadlines so the sweep time separates the entries.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let (_, _t2) = gate.request(call("toolu_2"), "b?");

        // Only toolu_1 is past its deadline at this reference time.
        let swept = gate.expire_overdue(pending.expires_at);
        assert_eq!(swept, vec!["toolu_1".to_string()]);
        assert_eq!(gate.state_of("toolu_1"), Some(ConfirmationState::Expired));
        assert_eq!(gate.state_of("toolu_2"), Some(ConfirmationState::Pending));
    }

    #[test]
    fn pending_listing_is_oldest_first_and_prunable() {
        let (gate, _feed) = gate();
        gate.request(call("toolu_1"), "a?");
        gate.request(call("toolu_2"), "b?");
        assert_eq!(gate.pending().len(), 2);
        assert_eq!(gate.pending()[0].correlation_id, "toolu_1");

        gate.resolve("toolu_1", ConfirmationDecision::Reject)
            .unwrap();
        gate.prune_resolved();
        assert_eq!(gate.pending().len(), 1);
        assert_eq!(gate.state_of("toolu_1"), None);
    }
}
