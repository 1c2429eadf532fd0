//! Confirmation state machine types
//!
//! Every write tool call produces a [`PendingConfirmation`] that must
//! be resolved by an explicit external decision before the handler may
//! run. States move `PENDING -> {ACCEPTED, REJECTED, EXPIRED}` and the
//! terminal states are final: a second resolution for the same
//! correlation id is a no-op.

pub mod prompt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::calls::ValidatedToolCall;

/// Lifecycle state of a pending confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationState {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl ConfirmationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConfirmationState::Pending)
    }
}

/// Decision supplied from outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationDecision {
    Accept,
    Reject,
}

/// How a pending confirmation ended.
///
/// `Expired` is observationally identical to `Rejected` for execution
/// purposes — the handler never runs — but the kinds stay distinct for
/// telemetry and the message fed back to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Accepted,
    Rejected,
    Expired,
}

impl Resolution {
    pub fn allows_execution(&self) -> bool {
        matches!(self, Resolution::Accepted)
    }

    pub fn state(&self) -> ConfirmationState {
        match self {
            Resolution::Accepted => ConfirmationState::Accepted,
            Resolution::Rejected => ConfirmationState::Rejected,
            Resolution::Expired => ConfirmationState::Expired,
        }
    }
}

/// A write tool call suspended at the gate, awaiting a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfirmation {
    /// Same id as the intercepted tool call
    pub correlation_id: String,
    /// The validated call that will run on acceptance
    pub tool_call: ValidatedToolCall,
    /// User-facing confirmation prompt (PT-BR)
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingConfirmation {
    /// Create a pending record expiring `ttl` after `now`.
    pub fn new(tool_call: ValidatedToolCall, message: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            correlation_id: tool_call.correlation_id.clone(),
            tool_call,
            message: message.into(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
