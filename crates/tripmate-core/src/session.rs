//! Session state: the ordered chat timeline, trip details, and the pending edit

use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::error::ChatError;
use crate::provider::{SpeakerRole, Turn};
use crate::state::{long_date, ChatEntry, EntryId};
use crate::trip::TripDetails;

/// One screen's conversation. Owned by a single UI instance, never shared.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    generation: u64,
    next_id: u64,
    entries: Vec<ChatEntry>,
    trip: TripDetails,
    editing: Option<EntryId>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            generation: 0,
            next_id: 0,
            entries: Vec::new(),
            trip: TripDetails::default(),
            editing: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Bumped by every [`Session::reset`]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn entry(&self, id: EntryId) -> Option<&ChatEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn trip_details(&self) -> &TripDetails {
        &self.trip
    }

    pub fn editing(&self) -> Option<EntryId> {
        self.editing
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_date_marker(&self) -> bool {
        self.entries.iter().any(ChatEntry::is_date_marker)
    }

    fn allocate_id(&mut self) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert the session's date marker. Returns `None` if one already exists.
    pub fn insert_date_marker(&mut self, at: DateTime<Local>) -> Option<EntryId> {
        if self.has_date_marker() {
            return None;
        }
        let id = self.allocate_id();
        self.entries.push(ChatEntry::DateMarker {
            id,
            display_date: long_date(at),
            created_at: at,
        });
        Some(id)
    }

    /// Append a user message and re-scan trip details from its text.
    ///
    /// With an edit pending the text replaces the edited entry instead (see
    /// [`Session::commit_edit`]) and the entry count is unchanged. Otherwise
    /// empty or whitespace-only text is rejected.
    pub fn append_user_message(&mut self, text: &str) -> Result<EntryId, ChatError> {
        if let Some(id) = self.commit_edit(text) {
            return Ok(id);
        }
        if text.trim().is_empty() {
            return Err(ChatError::empty_message());
        }
        let id = self.allocate_id();
        self.entries.push(ChatEntry::User {
            id,
            text: text.to_string(),
            created_at: Local::now(),
        });
        self.trip.absorb(text);
        Ok(id)
    }

    pub fn append_assistant_message(&mut self, text: &str) -> EntryId {
        let id = self.allocate_id();
        self.entries.push(ChatEntry::Assistant {
            id,
            text: text.to_string(),
            created_at: Local::now(),
        });
        id
    }

    /// Start editing a user message. Returns its text to preload the input,
    /// or `None` (and changes nothing) if `id` is not a user message.
    pub fn begin_edit(&mut self, id: EntryId) -> Option<String> {
        let text = match self.entry(id)? {
            ChatEntry::User { text, .. } => text.clone(),
            _ => return None,
        };
        self.editing = Some(id);
        Some(text)
    }

    /// Replace the edited entry's text in place and clear the pending edit.
    ///
    /// Trip details are not re-scanned and no reply is requested.
    /// Returns the edited id, or `None` when no edit was pending.
    pub fn commit_edit(&mut self, new_text: &str) -> Option<EntryId> {
        let target = self.editing.take()?;
        for entry in &mut self.entries {
            if let ChatEntry::User { id, text, .. } = entry {
                if *id == target {
                    *text = new_text.to_string();
                    return Some(target);
                }
            }
        }
        None
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Drop everything but the date marker and forget trip details
    pub fn reset(&mut self) {
        self.entries.retain(ChatEntry::is_date_marker);
        self.trip.clear();
        self.editing = None;
        self.generation += 1;
    }

    /// Text of the most recent assistant message
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.is_assistant())
            .map(ChatEntry::text)
    }

    /// Every non-marker entry as a speaker turn, oldest first
    pub fn history(&self) -> Vec<Turn> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                ChatEntry::DateMarker { .. } => None,
                ChatEntry::User { text, .. } => Some(Turn::new(SpeakerRole::User, text)),
                ChatEntry::Assistant { text, .. } => Some(Turn::new(SpeakerRole::Model, text)),
            })
            .collect()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Session {
        let mut session = Session::new();
        session.insert_date_marker(Local::now());
        session.append_assistant_message("Hello, where to?");
        session
    }

    #[test]
    fn test_append_grows_by_one() {
        let mut session = seeded();
        for (i, text) in ["one", "two", "three"].iter().enumerate() {
            session.append_user_message(text).unwrap();
            assert_eq!(session.entries().len(), 3 + i);
        }
        let ids: Vec<_> = session.entries().iter().map(ChatEntry::id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_empty_text_rejected() {
        let mut session = seeded();
        let err = session.append_user_message("   ").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(session.entries().len(), 2);
    }

    #[test]
    fn test_append_rescans_trip_details() {
        let mut session = seeded();
        session.append_user_message("I want to go to Tokyo").unwrap();
        assert_eq!(session.trip_details().destination.as_deref(), Some("Tokyo"));
    }

    #[test]
    fn test_begin_edit_ignores_non_user_entries() {
        let mut session = seeded();
        let marker = session.entries()[0].id();
        let greeting = session.entries()[1].id();
        assert!(session.begin_edit(marker).is_none());
        assert!(session.begin_edit(greeting).is_none());
        assert!(session.begin_edit(EntryId(99)).is_none());
        assert!(session.editing().is_none());
    }

    #[test]
    fn test_commit_edit_preserves_identity() {
        let mut session = seeded();
        let id = session.append_user_message("go to Rome").unwrap();
        let before = session.entry(id).unwrap().clone();

        assert_eq!(session.begin_edit(id).as_deref(), Some("go to Rome"));
        assert_eq!(session.editing(), Some(id));
        assert_eq!(session.commit_edit("go to Naples"), Some(id));

        let after = session.entry(id).unwrap();
        assert_eq!(session.entries().len(), 3);
        assert_eq!(after.id(), before.id());
        assert_eq!(after.created_at(), before.created_at());
        assert_eq!(after.text(), "go to Naples");
        assert!(session.editing().is_none());
        // no re-scan on edit
        assert_eq!(session.trip_details().destination.as_deref(), Some("Rome"));
    }

    #[test]
    fn test_append_during_edit_commits_in_place() {
        let mut session = seeded();
        let id = session.append_user_message("dates May").unwrap();
        session.begin_edit(id);

        assert_eq!(session.append_user_message("").unwrap(), id);
        assert_eq!(session.entries().len(), 3);
        assert_eq!(session.entry(id).unwrap().text(), "");
        assert!(session.editing().is_none());
        // edits never re-scan
        assert_eq!(session.trip_details().dates.as_deref(), Some("May"));

        // the next append is a normal one again
        assert!(session.append_user_message(" ").unwrap_err().is_validation());
        session.append_user_message("budget 500").unwrap();
        assert_eq!(session.entries().len(), 4);
    }

    #[test]
    fn test_commit_without_edit_is_noop() {
        let mut session = seeded();
        assert!(session.commit_edit("anything").is_none());
        assert_eq!(session.entries().len(), 2);
    }

    #[test]
    fn test_reset_keeps_only_marker() {
        let mut session = seeded();
        let id = session.append_user_message("budget 900").unwrap();
        session.begin_edit(id);
        let generation = session.generation();

        session.reset();

        assert_eq!(session.entries().len(), 1);
        assert!(session.entries()[0].is_date_marker());
        assert!(session.trip_details().is_empty());
        assert!(session.editing().is_none());
        assert_eq!(session.generation(), generation + 1);
    }

    #[test]
    fn test_reset_without_marker_empties() {
        let mut session = Session::new();
        session.append_user_message("hello").unwrap();
        session.reset();
        assert!(session.is_empty());
    }

    #[test]
    fn test_single_date_marker() {
        let mut session = seeded();
        assert!(session.insert_date_marker(Local::now()).is_none());
        session.reset();
        assert!(session.insert_date_marker(Local::now()).is_none());
        let markers = session.entries().iter().filter(|e| e.is_date_marker()).count();
        assert_eq!(markers, 1);
    }

    #[test]
    fn test_history_skips_marker() {
        let mut session = seeded();
        session.append_user_message("hi").unwrap();
        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, SpeakerRole::Model);
        assert_eq!(history[1].role, SpeakerRole::User);
        assert_eq!(history[1].text, "hi");
    }
}
