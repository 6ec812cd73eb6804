//! Booking state machine phases.

use serde::{Deserialize, Serialize};

use super::record::BookingRecord;

/// The phases of a booking conversation.
///
/// Collecting ⇄ AwaitingConfirmation → Committed | Cancelled. Cancellation is
/// reachable from every non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingPhase {
    Collecting,
    AwaitingConfirmation,
    Committed,
    Cancelled,
}

impl BookingPhase {
    /// Derive the live phase of a record.
    pub fn of(record: &BookingRecord) -> Self {
        if record.awaiting_confirmation {
            Self::AwaitingConfirmation
        } else {
            Self::Collecting
        }
    }

    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: BookingPhase) -> bool {
        use BookingPhase::*;
        matches!(
            (self, target),
            (Collecting, Collecting)
                | (Collecting, AwaitingConfirmation)
                | (Collecting, Cancelled)
                | (AwaitingConfirmation, AwaitingConfirmation)
                | (AwaitingConfirmation, Collecting)
                | (AwaitingConfirmation, Committed)
                | (AwaitingConfirmation, Cancelled)
        )
    }

    /// Whether this phase ends the booking (the record is reset).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Cancelled)
    }
}

impl Default for BookingPhase {
    fn default() -> Self {
        Self::Collecting
    }
}

impl std::fmt::Display for BookingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Collecting => "collecting",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::Committed => "committed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}
