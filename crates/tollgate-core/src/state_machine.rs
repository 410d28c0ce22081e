use std::fmt;

use crate::error::CoreError;

/// The lifecycle states of an issued payment address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PaymentStatus {
    /// Address issued, unexpired, no positive balance observed yet.
    Active,
    /// Positive balance observed once; invoice dispatched; eligible for sweep.
    Detected,
    /// Sweep transaction being constructed and broadcast. Guards against
    /// duplicate sweep attempts on the same record.
    Settling,
    /// Sweep transaction accepted by the network. Final state.
    Swept,
    /// Payment window elapsed with no deposit. Final state; derived by
    /// readers from the expiry timestamp, never stored by the scheduler.
    Expired,
}

impl PaymentStatus {
    /// Whether this is a final (terminal) state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Swept | Self::Expired)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Detected => write!(f, "Detected"),
            Self::Settling => write!(f, "Settling"),
            Self::Swept => write!(f, "Swept"),
            Self::Expired => write!(f, "Expired"),
        }
    }
}

/// Events that trigger status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A positive balance was observed for the address.
    BalanceObserved,
    /// A sweep attempt claimed the record.
    SweepStarted,
    /// The sweep transaction was accepted by the network.
    SweepConfirmed,
    /// The sweep attempt failed before or during broadcast.
    SweepFailed,
    /// The payment window elapsed without a deposit.
    WindowElapsed,
}

/// Validates payment status transitions.
///
/// Valid transitions:
/// - Active → Detected (BalanceObserved)
/// - Active → Expired (WindowElapsed)
/// - Detected → Settling (SweepStarted)
/// - Settling → Swept (SweepConfirmed)
/// - Settling → Detected (SweepFailed)
///
/// `Settling → Detected` is the only backward edge; a record never returns
/// to Active once a balance has been detected, and only a still-Active
/// record can expire.
pub struct PaymentLifecycle;

impl PaymentLifecycle {
    /// Attempt a status transition based on an event.
    /// Returns the new status on success, or an error for invalid transitions.
    pub fn transition(
        current: PaymentStatus,
        event: LifecycleEvent,
    ) -> Result<PaymentStatus, CoreError> {
        let new_status = match (current, event) {
            // From Active
            (PaymentStatus::Active, LifecycleEvent::BalanceObserved) => PaymentStatus::Detected,
            (PaymentStatus::Active, LifecycleEvent::WindowElapsed) => PaymentStatus::Expired,

            // From Detected
            (PaymentStatus::Detected, LifecycleEvent::SweepStarted) => PaymentStatus::Settling,

            // From Settling
            (PaymentStatus::Settling, LifecycleEvent::SweepConfirmed) => PaymentStatus::Swept,
            (PaymentStatus::Settling, LifecycleEvent::SweepFailed) => PaymentStatus::Detected,

            // All other transitions are invalid
            _ => {
                let target = match event {
                    LifecycleEvent::BalanceObserved => PaymentStatus::Detected,
                    LifecycleEvent::SweepStarted => PaymentStatus::Settling,
                    LifecycleEvent::SweepConfirmed => PaymentStatus::Swept,
                    LifecycleEvent::SweepFailed => PaymentStatus::Detected,
                    LifecycleEvent::WindowElapsed => PaymentStatus::Expired,
                };
                return Err(CoreError::InvalidStateTransition {
                    from: current,
                    to: target,
                });
            }
        };

        tracing::debug!(
            from = %current,
            to = %new_status,
            event = ?event,
            "payment status transition"
        );

        Ok(new_status)
    }

    /// Check if a transition is valid without performing it.
    pub fn can_transition(current: PaymentStatus, event: LifecycleEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
