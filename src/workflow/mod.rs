//! The admin access-management workflow.
//!
//! [`reduce`] is a pure state machine over [`WorkflowState`]; the
//! [`AccessManager`] feeds it events and carries out the commands it returns
//! against an [`AdminApi`](crate::client::AdminApi).

pub mod controller;
pub mod guard;
pub mod reducer;
pub mod roster;
pub mod state;

pub use controller::{AccessManager, Effect};
pub use guard::{effective_flags, evaluate_close, CloseDecision};
pub use reducer::{reduce, Command, Context, Event, Transition, HIGHLIGHT_DURATION};
pub use roster::{roster, RosterRow};
pub use state::{Highlight, HighlightTone, NewAdminReminder, PendingChange, Phase, WorkflowState};
