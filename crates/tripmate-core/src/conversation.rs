//! Conversation client: turns session state into completion calls and folds
//! the replies back into the session.
//!
//! Each call is split into three phases so a UI can run the network part on a
//! background task while it keeps exclusive ownership of the [`Session`]:
//!
//! 1. [`ConversationClient::greeting_call`] / [`ConversationClient::prepare_turn`]
//!    mutate the session and hand back a [`PendingReply`] ticket plus the request.
//! 2. [`ConversationClient::complete`] performs the call.
//! 3. [`ConversationClient::apply`] folds the result into the session, unless the
//!    ticket no longer matches it (session replaced or reset in the meantime).
//!
//! [`ConversationClient::start_greeting`] and [`ConversationClient::send_turn`]
//! run all three in sequence.

use std::sync::Arc;

use chrono::Local;
use uuid::Uuid;

use crate::error::{ChatError, ServiceError};
use crate::notify::{Notification, Notifier};
use crate::provider::{CompletionRequest, CompletionService};
use crate::session::Session;
use crate::state::EntryId;
use crate::trip::{TripDetails, NOT_SPECIFIED};

pub const GREETING_PROMPT: &str =
    "Hey there! Looking to plan a trip? Let's fulfill your dreams together!";

pub const NO_PREVIOUS_RESPONSE: &str = "No previous response.";

const GREETING_FAILED: &str = "Failed to start chat. Please try again.";
const TURN_FAILED: &str = "Failed to send message. Please try again.";

/// Topics offered as quick-reply buttons
pub const QUICK_REPLY_TOPICS: [&str; 9] = [
    "flights",
    "accommodations",
    "itinerary",
    "attractions",
    "restaurants",
    "transportation",
    "packing tips",
    "local tips",
    "weather forecast",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Greeting,
    Turn,
}

/// Ticket tying an in-flight call to the session state it was issued from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReply {
    session_id: Uuid,
    generation: u64,
    kind: ReplyKind,
}

impl PendingReply {
    fn issue(session: &Session, kind: ReplyKind) -> Self {
        Self {
            session_id: session.id(),
            generation: session.generation(),
            kind,
        }
    }

    pub fn kind(&self) -> ReplyKind {
        self.kind
    }

    /// Whether `session` is still the state this reply was requested for
    pub fn matches(&self, session: &Session) -> bool {
        self.session_id == session.id() && self.generation == session.generation()
    }
}

/// Result of [`ConversationClient::prepare_turn`]
#[derive(Debug)]
pub enum PreparedTurn {
    /// A pending edit was committed in place; nothing to send
    Edited(EntryId),
    /// The user message was appended; run this request
    Call {
        user_entry: EntryId,
        pending: PendingReply,
        request: CompletionRequest,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The reply was appended as this assistant entry
    Replied(EntryId),
    /// A pending edit was committed instead of sending
    Edited(EntryId),
    /// The call failed and a notification was sent
    Failed,
    /// The session moved on before the reply arrived
    Discarded,
}

#[derive(Clone)]
pub struct ConversationClient {
    service: Arc<dyn CompletionService>,
    notifier: Arc<dyn Notifier>,
    model: String,
}

impl ConversationClient {
    pub fn new(service: Arc<dyn CompletionService>, notifier: Arc<dyn Notifier>) -> Self {
        let model = service.model_id().to_string();
        Self {
            service,
            notifier,
            model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Opening call: fixed prompt, no history
    pub fn greeting_call(&self, session: &Session) -> (PendingReply, CompletionRequest) {
        let request = CompletionRequest {
            model: self.model.clone(),
            history: Vec::new(),
            prompt: GREETING_PROMPT.to_string(),
        };
        (PendingReply::issue(session, ReplyKind::Greeting), request)
    }

    /// Commit a pending edit, or append the user message and build the turn request.
    ///
    /// History and the previous reply are taken from the entries before the new
    /// message; trip details are the snapshot after re-scanning it.
    pub fn prepare_turn(&self, session: &mut Session, raw_input: &str) -> Result<PreparedTurn, ChatError> {
        if let Some(id) = session.commit_edit(raw_input) {
            tracing::debug!(entry = %id, "committed edit");
            return Ok(PreparedTurn::Edited(id));
        }

        let history = session.history();
        let previous = session
            .last_assistant_text()
            .unwrap_or(NO_PREVIOUS_RESPONSE)
            .to_string();

        let user_entry = session.append_user_message(raw_input)?;
        let prompt = build_turn_prompt(session.trip_details(), &previous, raw_input);

        Ok(PreparedTurn::Call {
            user_entry,
            pending: PendingReply::issue(session, ReplyKind::Turn),
            request: CompletionRequest {
                model: self.model.clone(),
                history,
                prompt,
            },
        })
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        tracing::info!(
            model = %request.model,
            history = request.history.len(),
            "requesting completion"
        );
        let start = std::time::Instant::now();
        let result = self.service.complete(request).await;
        match &result {
            Ok(text) => tracing::info!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                chars = text.len(),
                "completion received"
            ),
            Err(e) => tracing::warn!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                kind = ?e.kind,
                error = %e,
                "completion failed"
            ),
        }
        result
    }

    /// Fold a finished call back into the session.
    ///
    /// Failures notify and leave the session as it is: an empty session after a
    /// failed greeting, the user's message kept after a failed turn.
    pub fn apply(
        &self,
        session: &mut Session,
        pending: &PendingReply,
        result: Result<String, ServiceError>,
    ) -> ReplyOutcome {
        if !pending.matches(session) {
            tracing::debug!(kind = ?pending.kind, "discarding reply for a stale session");
            return ReplyOutcome::Discarded;
        }

        match (pending.kind, result) {
            (ReplyKind::Greeting, Ok(text)) => {
                session.insert_date_marker(Local::now());
                ReplyOutcome::Replied(session.append_assistant_message(&sanitize(&text)))
            }
            (ReplyKind::Turn, Ok(text)) => {
                ReplyOutcome::Replied(session.append_assistant_message(&sanitize(&text)))
            }
            (ReplyKind::Greeting, Err(_)) => {
                self.notifier.notify(Notification::danger("Error", GREETING_FAILED));
                ReplyOutcome::Failed
            }
            (ReplyKind::Turn, Err(_)) => {
                self.notifier.notify(Notification::danger("Error", TURN_FAILED));
                ReplyOutcome::Failed
            }
        }
    }

    pub async fn start_greeting(&self, session: &mut Session) -> ReplyOutcome {
        let (pending, request) = self.greeting_call(session);
        let result = self.complete(&request).await;
        self.apply(session, &pending, result)
    }

    pub async fn send_turn(&self, session: &mut Session, raw_input: &str) -> Result<ReplyOutcome, ChatError> {
        match self.prepare_turn(session, raw_input)? {
            PreparedTurn::Edited(id) => Ok(ReplyOutcome::Edited(id)),
            PreparedTurn::Call { pending, request, .. } => {
                let result = self.complete(&request).await;
                Ok(self.apply(session, &pending, result))
            }
        }
    }
}

/// Strip emphasis markers and surrounding whitespace from model output
pub fn sanitize(response_text: &str) -> String {
    response_text.replace('*', "").trim().to_string()
}

pub fn build_turn_prompt(trip: &TripDetails, previous_response: &str, current_message: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str("You are planning a trip. Here are the details:\n");
    prompt.push_str(&format!("- Destination: {}\n", trip.destination_or(NOT_SPECIFIED)));
    prompt.push_str(&format!("- Dates: {}\n", trip.dates_or(NOT_SPECIFIED)));
    prompt.push_str(&format!("- Interests: {}\n", trip.interests_or(NOT_SPECIFIED)));
    prompt.push_str(&format!("- Budget: {}\n", trip.budget_or(NOT_SPECIFIED)));
    prompt.push_str(&format!("Previous response: {}\n", previous_response));
    prompt.push_str(&format!("Current message: {}\n", current_message));
    prompt.push_str(
        "Provide detailed trip planning advice based on the above details, \
         considering the previous response for context.",
    );

    prompt
}

/// Message sent when a quick-reply topic is picked
pub fn quick_reply_prompt(topic: &str, trip: &TripDetails) -> String {
    format!(
        "Tell me about {} for my trip to {}",
        topic,
        trip.destination_or("my destination")
    )
}
