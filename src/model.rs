use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Notification title used when the trigger payload carries none.
pub const DEFAULT_TITLE: &str = "New Order!";
/// Notification body used when the trigger payload carries none.
pub const DEFAULT_MESSAGE: &str = "You have a new order to accept";

/// Haptic waveform in milliseconds: initial delay, then on/off segments.
/// The channel replays it from index 0 until cancelled.
pub const VIBRATION_PATTERN: [u64; 7] = [0, 500, 200, 500, 200, 500, 500];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Screen the UI navigates to when an alert is opened.
    pub navigation_target: String,
    pub nav_max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub nav_retry_delay: Duration,
    pub sound: bool,
    #[serde(with = "humantime_serde")]
    pub bell_interval: Duration,
    /// Override for the persisted UI state directory; defaults to the user data dir.
    pub state_dir: Option<PathBuf>,
}

/// Inbound push payload as handed over by the push-delivery subsystem.
/// `data` is the flat string map; `notification` is the optional display block
/// attached by the sender.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushMessage {
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default)]
    pub notification: Option<NotificationFields>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationFields {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

/// A request to raise the order alert. All fields are optional; the controller
/// substitutes display defaults for missing title/message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRequest {
    pub title: Option<String>,
    pub message: Option<String>,
    pub order_id: Option<String>,
}

/// Point-in-time view of the controller state for the status surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSnapshot {
    pub running: bool,
    pub order_id: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
}

/// Content of the persistent notification handed to the presenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertNotification {
    pub title: String,
    pub message: String,
    pub order_id: Option<String>,
    pub actions: Vec<NotificationAction>,
}

/// Actions carried on the persistent notification. The two have distinct
/// semantics: `View` opens the app on the order screen (which stops the alert
/// on the way), `Dismiss` only stops the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationAction {
    View,
    Dismiss,
}

impl NotificationAction {
    pub fn label(self) -> &'static str {
        match self {
            NotificationAction::View => "View Order",
            NotificationAction::Dismiss => "Dismiss",
        }
    }
}

/// Events emitted by the controller and the host loop, consumed by output layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlertEvent {
    AlertStarted {
        order_id: Option<String>,
    },
    AlertStopped,
    NotificationPosted {
        notification: AlertNotification,
    },
    NotificationWithdrawn,
    /// Message did not classify as order-alert-worthy; default notification
    /// handling (outside this host) applies.
    PassedThrough {
        kind: Option<String>,
        title: Option<String>,
    },
    Status {
        snapshot: AlertSnapshot,
    },
    NavigationDelivered {
        path: String,
        attempt: u32,
    },
    NavigationAbandoned {
        path: String,
        attempts: u32,
    },
    Info(InfoEvent),
}

/// Structured info events for conditions that are reported but never fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InfoEvent {
    Message(String),
    StartIgnored,
    StopIgnored,
    SoundUnavailable { reason: String },
    HapticsUnavailable { reason: String },
    NotificationFailed { reason: String },
    ReleaseFailed { channel: String, reason: String },
    HintWriteFailed { reason: String },
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::StartIgnored => "alert already active, start ignored".to_string(),
            InfoEvent::StopIgnored => "no active alert, stop ignored".to_string(),
            InfoEvent::SoundUnavailable { reason } => {
                format!("sound channel unavailable, continuing without audio: {reason}")
            }
            InfoEvent::HapticsUnavailable { reason } => {
                format!("haptic channel unavailable, continuing without vibration: {reason}")
            }
            InfoEvent::NotificationFailed { reason } => {
                format!("failed to post alert notification: {reason}")
            }
            InfoEvent::ReleaseFailed { channel, reason } => {
                format!("failed to release {channel} channel: {reason}")
            }
            InfoEvent::HintWriteFailed { reason } => {
                format!("failed to persist navigation hints: {reason}")
            }
        }
    }
}
