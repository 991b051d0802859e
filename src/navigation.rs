//! Delivery of the post-alert navigation instruction to the UI layer.
//!
//! When the app is cold-started from the alert, the UI may not be ready to
//! receive a navigation instruction yet. Delivery polls readiness with a
//! bounded, fixed-interval retry and reports an explicit outcome to the
//! caller instead of giving up silently.

use anyhow::Result;
use std::time::Duration;
use tokio::time::sleep;

/// Bridge to the UI layer that ultimately performs the navigation.
pub trait UiBridge: Send + Sync {
    /// Whether the UI is ready to receive a navigation instruction.
    fn is_ready(&self) -> bool;
    /// Hand the path to the UI. Only called once `is_ready` reports true;
    /// a failure here counts as one spent attempt.
    fn deliver(&self, path: &str) -> Result<()>;
}

/// UI bridge for the stream host: the downstream UI consumes our event
/// stream, so it is always ready and the emitted delivery event is the
/// instruction itself.
pub struct StreamUiBridge;

impl UiBridge for StreamUiBridge {
    fn is_ready(&self) -> bool {
        true
    }

    fn deliver(&self, _path: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    Delivered { attempt: u32 },
    GaveUp { attempts: u32 },
}

/// Build the in-app navigation path for a target screen and optional order id.
pub fn build_path(target: &str, order_id: Option<&str>) -> String {
    let mut path = format!("/{}", target.trim_start_matches('/'));
    if let Some(id) = order_id.filter(|id| !id.is_empty()) {
        path.push_str("?orderId=");
        path.push_str(&encode_query_value(id));
    }
    path
}

/// Percent-encode a query value; RFC 3986 unreserved bytes pass through.
fn encode_query_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Poll the bridge until the path is delivered or the attempt cap is spent.
pub async fn deliver_when_ready(
    bridge: &dyn UiBridge,
    path: &str,
    max_attempts: u32,
    retry_delay: Duration,
) -> NavOutcome {
    for attempt in 1..=max_attempts {
        if bridge.is_ready() && bridge.deliver(path).is_ok() {
            return NavOutcome::Delivered { attempt };
        }
        if attempt < max_attempts {
            sleep(retry_delay).await;
        }
    }
    NavOutcome::GaveUp {
        attempts: max_attempts,
    }
}
