use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

/// Per-session counters for navigation and fragment activity.
#[derive(Debug, Default, Clone)]
pub struct SessionMetrics {
    navigations: u64,
    pages_not_found: u64,
    fragments_registered: u64,
    fragment_replays: u64,
    messages_enqueued: u64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_navigation(&mut self, page_found: bool) {
        self.navigations = self.navigations.saturating_add(1);
        if !page_found {
            self.pages_not_found = self.pages_not_found.saturating_add(1);
        }
    }

    pub fn record_fragment_registered(&mut self) {
        self.fragments_registered = self.fragments_registered.saturating_add(1);
    }

    pub fn record_fragment_replays(&mut self, count: usize) {
        if count > 0 {
            self.fragment_replays = self.fragment_replays.saturating_add(count as u64);
        }
    }

    pub fn record_enqueued(&mut self) {
        self.messages_enqueued = self.messages_enqueued.saturating_add(1);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            navigations: self.navigations,
            pages_not_found: self.pages_not_found,
            fragments_registered: self.fragments_registered,
            fragment_replays: self.fragment_replays,
            messages_enqueued: self.messages_enqueued,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub navigations: u64,
    pub pages_not_found: u64,
    pub fragments_registered: u64,
    pub fragment_replays: u64,
    pub messages_enqueued: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "session_metrics", self.as_fields())
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("navigations".to_string(), json!(self.navigations));
        map.insert("pages_not_found".to_string(), json!(self.pages_not_found));
        map.insert(
            "fragments_registered".to_string(),
            json!(self.fragments_registered),
        );
        map.insert("fragment_replays".to_string(), json!(self.fragment_replays));
        map.insert("messages_enqueued".to_string(), json!(self.messages_enqueued));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_counts_alongside_navigations() {
        let mut metrics = SessionMetrics::new();
        metrics.record_navigation(true);
        metrics.record_navigation(false);
        metrics.record_fragment_replays(0);
        metrics.record_fragment_replays(2);

        let snapshot = metrics.snapshot(Duration::from_millis(1500));
        assert_eq!(snapshot.navigations, 2);
        assert_eq!(snapshot.pages_not_found, 1);
        assert_eq!(snapshot.fragment_replays, 2);
        assert_eq!(snapshot.uptime_ms, 1500);
    }

    #[test]
    fn snapshot_renders_as_log_event() {
        let snapshot = SessionMetrics::new().snapshot(Duration::ZERO);
        let event = snapshot.to_log_event("session_nav::metrics");
        assert_eq!(event.message, "session_metrics");
        assert_eq!(event.field("navigations"), Some(&json!(0)));
    }
}
