//! Per-entry fade-in state, owned by the renderer and keyed by entry id.
//! Nothing here is part of the session itself.

use std::collections::HashMap;

use ratatui::style::Color;
use tripmate_core::{ChatEntry, EntryId};

/// Ticks an entry takes to become fully visible
pub const FADE_STEPS: u8 = 4;

#[derive(Debug, Default)]
pub struct FadeTable {
    progress: HashMap<EntryId, u8>,
}

impl FadeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fade for every entry not seen before
    pub fn sync(&mut self, entries: &[ChatEntry]) {
        for entry in entries {
            self.progress.entry(entry.id()).or_insert(0);
        }
    }

    pub fn advance(&mut self) {
        for step in self.progress.values_mut() {
            if *step < FADE_STEPS {
                *step += 1;
            }
        }
    }

    /// Forget every handle, treating what is still on screen as already visible
    pub fn reset(&mut self, remaining: &[ChatEntry]) {
        self.progress.clear();
        for entry in remaining {
            self.progress.insert(entry.id(), FADE_STEPS);
        }
    }

    /// Fade step for an entry; unknown entries render fully visible
    pub fn level(&self, id: EntryId) -> u8 {
        self.progress.get(&id).copied().unwrap_or(FADE_STEPS)
    }

    pub fn is_animating(&self) -> bool {
        self.progress.values().any(|step| *step < FADE_STEPS)
    }

    pub fn len(&self) -> usize {
        self.progress.len()
    }
}

/// Blend from dark gray towards `target` as the fade progresses
pub fn fade_color(level: u8, target: Color) -> Color {
    match level {
        0 => Color::Black,
        1 => Color::DarkGray,
        l if l < FADE_STEPS => Color::Gray,
        _ => target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripmate_core::Session;

    #[test]
    fn test_new_entries_start_hidden_and_fade_in() {
        let mut session = Session::new();
        let id = session.append_assistant_message("hi");
        let mut fades = FadeTable::new();

        fades.sync(session.entries());
        assert_eq!(fades.level(id), 0);
        assert!(fades.is_animating());

        for _ in 0..FADE_STEPS + 2 {
            fades.advance();
        }
        assert_eq!(fades.level(id), FADE_STEPS);
        assert!(!fades.is_animating());
    }

    #[test]
    fn test_sync_does_not_restart_fades() {
        let mut session = Session::new();
        let first = session.append_assistant_message("one");
        let mut fades = FadeTable::new();
        fades.sync(session.entries());
        fades.advance();

        let second = session.append_assistant_message("two");
        fades.sync(session.entries());
        assert_eq!(fades.level(first), 1);
        assert_eq!(fades.level(second), 0);
    }

    #[test]
    fn test_reset_discards_handles() {
        let mut session = Session::new();
        session.append_assistant_message("one");
        session.append_user_message("two").unwrap();
        let mut fades = FadeTable::new();
        fades.sync(session.entries());

        session.reset();
        fades.reset(session.entries());
        assert_eq!(fades.len(), 0);
    }

    #[test]
    fn test_unknown_entry_is_visible() {
        let fades = FadeTable::new();
        assert_eq!(fades.level(EntryId(42)), FADE_STEPS);
        assert_eq!(fade_color(FADE_STEPS, Color::White), Color::White);
        assert_eq!(fade_color(0, Color::White), Color::Black);
    }
}
