//! UI-agnostic conversation timeline types
//!
//! These are shared by every front end and don't depend on any UI framework.
//! Presentation state (fade-in progress, scroll offsets) lives with the
//! renderer, keyed by [`EntryId`].

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an entry, unique within one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry-{}", self.0)
    }
}

/// One unit in the conversation timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEntry {
    DateMarker {
        id: EntryId,
        display_date: String,
        created_at: DateTime<Local>,
    },
    User {
        id: EntryId,
        text: String,
        created_at: DateTime<Local>,
    },
    Assistant {
        id: EntryId,
        text: String,
        created_at: DateTime<Local>,
    },
}

impl ChatEntry {
    pub fn id(&self) -> EntryId {
        match self {
            ChatEntry::DateMarker { id, .. }
            | ChatEntry::User { id, .. }
            | ChatEntry::Assistant { id, .. } => *id,
        }
    }

    pub fn created_at(&self) -> DateTime<Local> {
        match self {
            ChatEntry::DateMarker { created_at, .. }
            | ChatEntry::User { created_at, .. }
            | ChatEntry::Assistant { created_at, .. } => *created_at,
        }
    }

    /// Message text, or the display date for a marker
    pub fn text(&self) -> &str {
        match self {
            ChatEntry::DateMarker { display_date, .. } => display_date,
            ChatEntry::User { text, .. } | ChatEntry::Assistant { text, .. } => text,
        }
    }

    pub fn is_date_marker(&self) -> bool {
        matches!(self, ChatEntry::DateMarker { .. })
    }

    pub fn is_user(&self) -> bool {
        matches!(self, ChatEntry::User { .. })
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, ChatEntry::Assistant { .. })
    }

    /// Short time shown under a message bubble, e.g. `14:05`
    pub fn display_time(&self) -> String {
        self.created_at().format("%H:%M").to_string()
    }
}

/// Long-form date used by the session's date marker, e.g. `Monday, October 19, 2026`
pub fn long_date(at: DateTime<Local>) -> String {
    at.format("%A, %B %-d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_long_date_format() {
        let at = Local.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap();
        assert_eq!(long_date(at), "Monday, October 19, 2026");
    }

    #[test]
    fn test_display_time_is_hours_and_minutes() {
        let at = Local.with_ymd_and_hms(2026, 3, 4, 7, 5, 59).unwrap();
        let entry = ChatEntry::User {
            id: EntryId(1),
            text: "hi".to_string(),
            created_at: at,
        };
        assert_eq!(entry.display_time(), "07:05");
    }

    #[test]
    fn test_marker_text_is_display_date() {
        let entry = ChatEntry::DateMarker {
            id: EntryId(0),
            display_date: "Friday, January 2, 2026".to_string(),
            created_at: Local::now(),
        };
        assert_eq!(entry.text(), "Friday, January 2, 2026");
        assert!(entry.is_date_marker());
        assert!(!entry.is_user());
    }
}
