//! User-visible notifications (transient banners)

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notification {
    pub fn new(title: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
        }
    }

    pub fn danger(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, Severity::Danger)
    }
}

/// Somewhere to show a notification
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl Notifier for UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) {
        if self.send(notification).is_err() {
            tracing::debug!("notification dropped: receiver closed");
        }
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().map(|seen| seen.len()).unwrap_or(0)
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_notifier_delivers() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.notify(Notification::danger("Error", "boom"));
        let got = rx.try_recv().unwrap();
        assert_eq!(got.title, "Error");
        assert_eq!(got.severity, Severity::Danger);
    }

    #[test]
    fn test_channel_notifier_tolerates_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Notification>();
        drop(rx);
        tx.notify(Notification::danger("Error", "nobody listening"));
    }

    #[test]
    fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        notifier.notify(Notification::new("Saved", "API key stored", Severity::Success));
        assert_eq!(notifier.count(), 1);
        assert_eq!(notifier.notifications()[0].description, "API key stored");
    }
}
