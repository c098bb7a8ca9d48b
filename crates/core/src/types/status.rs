//! Order status machine.
//!
//! Orders move through four live states:
//!
//! ```text
//! pending  -> ready, cancelled
//! ready    -> completed
//! completed   (terminal)
//! cancelled   (terminal)
//! ```
//!
//! The backend enforces the same table and rejects anything else with a 400.
//! Checking it here keeps illegal requests off the wire and lets a status
//! control offer only the moves that can succeed.
//!
//! Two older labels, `confirmed` and `preparing`, still show up in some
//! display maps. They are parsed into [`LegacyStatus`] so they can be shown,
//! but they never take part in transitions.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from checking a requested status change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The requested status is not reachable from the current one.
    #[error("invalid status transition from '{from}' to '{to}'")]
    InvalidTransition {
        /// Status the order currently has.
        from: OrderState,
        /// Status that was requested.
        to: OrderStatus,
    },
}

/// Error returned when a status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0}")]
pub struct StatusParseError(pub String);

/// Live order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order received, awaiting preparation.
    Pending,
    /// Prepared and waiting for pickup.
    Ready,
    /// Picked up by the customer.
    Completed,
    /// Cancelled by staff or customer.
    Cancelled,
}

impl OrderStatus {
    /// Every live status, in display order.
    pub const ALL: [Self; 4] = [Self::Pending, Self::Ready, Self::Completed, Self::Cancelled];

    /// Statuses reachable from this one in a single step.
    #[must_use]
    pub const fn next_allowed(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Ready, Self::Cancelled],
            Self::Ready => &[Self::Completed],
            Self::Completed | Self::Cancelled => &[],
        }
    }

    /// Whether `next` is a legal single step from this status.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.next_allowed().contains(&next)
    }

    /// Terminal statuses accept no further changes.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.next_allowed().is_empty()
    }

    /// Moving into this status cannot be undone and needs explicit confirmation.
    #[must_use]
    pub const fn is_destructive(self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Order received",
            Self::Ready => "Ready for pickup",
            Self::Completed => "Picked up",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(Self::Pending),
            "ready" => Ok(Self::Ready),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}

/// Display-only statuses from an earlier workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyStatus {
    Confirmed,
    Preparing,
}

impl LegacyStatus {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Confirmed => "Confirmed (legacy)",
            Self::Preparing => "Preparing (legacy)",
        }
    }
}

/// Status as reported by the backend: a live state or a legacy display case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OrderState {
    Live(OrderStatus),
    Legacy(LegacyStatus),
}

impl OrderState {
    /// Live statuses reachable from this state. Legacy states have none.
    #[must_use]
    pub const fn next_allowed(self) -> &'static [OrderStatus] {
        match self {
            Self::Live(status) => status.next_allowed(),
            Self::Legacy(_) => &[],
        }
    }

    /// The live status, if this is not a legacy state.
    #[must_use]
    pub const fn live(self) -> Option<OrderStatus> {
        match self {
            Self::Live(status) => Some(status),
            Self::Legacy(_) => None,
        }
    }

    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Live(OrderStatus::Pending))
    }

    /// Whether this state is a legacy display case.
    #[must_use]
    pub const fn is_legacy(self) -> bool {
        matches!(self, Self::Legacy(_))
    }

    /// Check a requested change against the transition table.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidTransition`] when `to` is not in
    /// [`Self::next_allowed`].
    pub fn check_transition(self, to: OrderStatus) -> Result<(), TransitionError> {
        if self.next_allowed().contains(&to) {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from: self, to })
        }
    }

    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live(status) => status.as_str(),
            Self::Legacy(legacy) => legacy.as_str(),
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Live(status) => status.label(),
            Self::Legacy(legacy) => legacy.label(),
        }
    }
}

impl From<OrderStatus> for OrderState {
    fn from(status: OrderStatus) -> Self {
        Self::Live(status)
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderState {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "confirmed" => Ok(Self::Legacy(LegacyStatus::Confirmed)),
            "preparing" => Ok(Self::Legacy(LegacyStatus::Preparing)),
            other => other.parse().map(Self::Live),
        }
    }
}

impl TryFrom<String> for OrderState {
    type Error = StatusParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderState> for String {
    fn from(state: OrderState) -> Self {
        state.as_str().to_string()
    }
}

/// One selectable entry of a status control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// What a status control offers for an order in a given state.
///
/// Only the current state and its legal successors are selectable; a state
/// with no successors yields a disabled control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusControl {
    pub options: Vec<StatusOption>,
    pub disabled: bool,
}

impl StatusControl {
    /// Build the control for an order currently in `state`.
    #[must_use]
    pub fn for_state(state: OrderState) -> Self {
        let next = state.next_allowed();
        let mut options = vec![StatusOption {
            value: state.as_str(),
            label: state.label(),
            selected: true,
        }];
        options.extend(
            OrderStatus::ALL
                .iter()
                .filter(|status| next.contains(status))
                .map(|status| StatusOption {
                    value: status.as_str(),
                    label: status.label(),
                    selected: false,
                }),
        );

        Self {
            options,
            disabled: next.is_empty(),
        }
    }

    /// Values of every selectable option.
    #[must_use]
    pub fn values(&self) -> Vec<&'static str> {
        self.options.iter().map(|o| o.value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        assert_eq!(
            OrderStatus::Pending.next_allowed(),
            &[OrderStatus::Ready, OrderStatus::Cancelled]
        );
        assert_eq!(OrderStatus::Ready.next_allowed(), &[OrderStatus::Completed]);
        assert!(OrderStatus::Completed.next_allowed().is_empty());
        assert!(OrderStatus::Cancelled.next_allowed().is_empty());
    }

    #[test]
    fn test_terminal_statuses_have_disabled_controls() {
        for status in [OrderStatus::Completed, OrderStatus::Cancelled] {
            assert!(status.is_terminal());
            let control = StatusControl::for_state(status.into());
            assert!(control.disabled);
            assert_eq!(control.values(), vec![status.as_str()]);
        }
    }

    #[test]
    fn test_every_illegal_transition_is_rejected() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let result = OrderState::Live(from).check_transition(to);
                assert_eq!(result.is_ok(), from.can_transition_to(to), "{from} -> {to}");
            }
        }
        // No self transitions and no way back.
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_pending_control_offers_current_and_successors() {
        let control = StatusControl::for_state(OrderStatus::Pending.into());
        assert!(!control.disabled);
        assert_eq!(control.values(), vec!["pending", "ready", "cancelled"]);
        assert!(control.options.first().is_some_and(|o| o.selected));
    }

    #[test]
    fn test_legacy_statuses_parse_but_never_transition() {
        let state: OrderState = serde_json::from_str("\"preparing\"").expect("legacy parses");
        assert_eq!(state, OrderState::Legacy(LegacyStatus::Preparing));
        assert!(state.next_allowed().is_empty());
        assert!(state.check_transition(OrderStatus::Ready).is_err());
        assert!(StatusControl::for_state(state).disabled);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!(serde_json::from_str::<OrderState>("\"shipped\"").is_err());
        assert!("".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_state_round_trips_as_string() {
        let json = serde_json::to_string(&OrderState::Live(OrderStatus::Ready)).expect("serialize");
        assert_eq!(json, "\"ready\"");
    }
}
