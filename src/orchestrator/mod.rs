//! Host-level orchestration.
//!
//! This module owns the command funnel that serializes every path able to
//! start or stop the alert (push triggers, UI commands, notification-action
//! taps, host teardown) and the hand-off to navigation delivery. Input and
//! output layers call into this module to keep responsibilities separated.

mod controller;

pub use controller::{run_controller, UiCommand};
