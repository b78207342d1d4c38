//! Order lifecycle.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::OrderError;

/// Where an order is in its lifecycle.
///
/// ```text
/// Draft ──► Reserved ──► Processing ──► Completed
///   │           │             │
///   └───────────┴─────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderState {
    #[default]
    Draft,
    Reserved,
    Processing,
    Completed,
    Cancelled,
}

/// Something a caller asks an order to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    ChangeItems,
    Submit,
    Reserve,
    StartProcessing,
    Complete,
    Cancel,
}

impl OrderAction {
    fn as_str(self) -> &'static str {
        match self {
            OrderAction::ChangeItems => "change items",
            OrderAction::Submit => "submit",
            OrderAction::Reserve => "reserve",
            OrderAction::StartProcessing => "start processing",
            OrderAction::Complete => "complete",
            OrderAction::Cancel => "cancel",
        }
    }
}

impl OrderState {
    pub fn permits(self, action: OrderAction) -> bool {
        use OrderAction::*;
        use OrderState::*;

        match (self, action) {
            (Draft, ChangeItems | Submit | Reserve) => true,
            (Reserved, StartProcessing) => true,
            (Processing, Complete) => true,
            (Draft | Reserved | Processing, Cancel) => true,
            _ => false,
        }
    }

    /// Fails with `InvalidStateTransition` if `action` is not allowed here.
    pub fn ensure(self, action: OrderAction) -> Result<(), OrderError> {
        if self.permits(action) {
            Ok(())
        } else {
            Err(OrderError::InvalidStateTransition {
                current_state: self,
                action: action.as_str(),
            })
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderState::Completed | OrderState::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderState::Draft => "Draft",
            OrderState::Reserved => "Reserved",
            OrderState::Processing => "Processing",
            OrderState::Completed => "Completed",
            OrderState::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
