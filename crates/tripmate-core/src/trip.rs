//! Best-effort keyword extraction of trip parameters from user messages

use serde::{Deserialize, Serialize};

const DESTINATION_MARKER: &str = "go to";
const DATES_MARKER: &str = "dates";
const INTERESTS_MARKER: &str = "interests";
const BUDGET_MARKER: &str = "budget";

/// Fallback shown in prompts for a field that was never captured
pub const NOT_SPECIFIED: &str = "Not specified";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripDetails {
    pub destination: Option<String>,
    pub dates: Option<String>,
    pub interests: Option<String>,
    pub budget: Option<String>,
}

impl TripDetails {
    /// Update fields whose marker appears in `text`; other fields keep their value.
    ///
    /// Markers are scanned independently, so one message can fill several fields.
    /// Values are not validated.
    pub fn absorb(&mut self, text: &str) {
        let lower = text.to_lowercase();

        for (marker, field) in [
            (DESTINATION_MARKER, &mut self.destination),
            (DATES_MARKER, &mut self.dates),
            (INTERESTS_MARKER, &mut self.interests),
            (BUDGET_MARKER, &mut self.budget),
        ] {
            if !lower.contains(marker) {
                continue;
            }
            if let Some(value) = capture_after(text, marker) {
                *field = Some(value);
            }
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.destination.is_none()
            && self.dates.is_none()
            && self.interests.is_none()
            && self.budget.is_none()
    }

    pub fn destination_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.destination.as_deref().unwrap_or(fallback)
    }

    pub fn dates_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.dates.as_deref().unwrap_or(fallback)
    }

    pub fn interests_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.interests.as_deref().unwrap_or(fallback)
    }

    pub fn budget_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.budget.as_deref().unwrap_or(fallback)
    }
}

/// Text between the first and second occurrence of `marker`, trimmed.
///
/// The split is case-sensitive on the original text, so "Go to Rome" has no
/// capture even though the lowercase scan matched.
fn capture_after(text: &str, marker: &str) -> Option<String> {
    let value = text.split(marker).nth(1)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
