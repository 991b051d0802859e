//! Decides whether an inbound push message warrants the continuous order alert.
//!
//! Everything else passes through to default notification handling, which is
//! outside this host's responsibility.

/// Event types that always announce a new order, matched case-insensitively.
const ORDER_EVENT_TYPES: [&str; 3] = ["new_order_available", "order_placed", "new_order"];

/// Title substrings used as a fallback when the type field is absent or
/// unrecognized.
const ORDER_TITLE_MARKERS: [&str; 2] = ["new order", "order available"];

/// Returns true when the message should raise the continuous alert.
pub fn is_order_alert(kind: Option<&str>, title: Option<&str>) -> bool {
    if let Some(kind) = kind {
        let kind = kind.to_lowercase();
        if ORDER_EVENT_TYPES.iter().any(|t| *t == kind) {
            return true;
        }
    }

    if let Some(title) = title {
        let title = title.to_lowercase();
        if ORDER_TITLE_MARKERS.iter().any(|m| title.contains(m)) {
            return true;
        }
    }

    false
}
