use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tripmate_core::conversation::sanitize;
use tripmate_core::{
    ChatEntry, CompletionRequest, CompletionService, ConversationClient, RecordingNotifier,
    ReplyOutcome, ServiceError, Session,
};

struct CannedService {
    replies: Mutex<VecDeque<Result<String, ServiceError>>>,
}

impl CannedService {
    fn new(replies: Vec<Result<String, ServiceError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
        })
    }
}

#[async_trait]
impl CompletionService for CannedService {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, ServiceError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::unknown("no more replies")))
    }

    fn model_id(&self) -> &str {
        "gemini-1.5-flash"
    }
}

#[tokio::test]
async fn test_greeting_then_failed_turn() {
    let service = CannedService::new(vec![
        Ok("Hello, where to?".to_string()),
        Err(ServiceError::network("connection reset")),
    ]);
    let notifier = Arc::new(RecordingNotifier::new());
    let client = ConversationClient::new(service, notifier.clone());
    let mut session = Session::new();

    client.start_greeting(&mut session).await;
    assert_eq!(session.entries().len(), 2);
    assert!(matches!(session.entries()[0], ChatEntry::DateMarker { .. }));
    assert!(matches!(
        &session.entries()[1],
        ChatEntry::Assistant { text, .. } if text == "Hello, where to?"
    ));

    let outcome = client.send_turn(&mut session, "I want to go to Tokyo").await.unwrap();

    assert_eq!(outcome, ReplyOutcome::Failed);
    assert_eq!(session.entries().len(), 3);
    assert!(matches!(
        &session.entries()[2],
        ChatEntry::User { text, .. } if text == "I want to go to Tokyo"
    ));
    assert_eq!(session.trip_details().destination.as_deref(), Some("Tokyo"));
    assert_eq!(notifier.count(), 1);
}

#[tokio::test]
async fn test_markers_from_one_message_and_reset() {
    let service = CannedService::new(vec![
        Ok("Hi!".to_string()),
        Ok("Sounds good".to_string()),
        Ok("Museums it is".to_string()),
    ]);
    let notifier = Arc::new(RecordingNotifier::new());
    let client = ConversationClient::new(service, notifier.clone());
    let mut session = Session::new();
    client.start_greeting(&mut session).await;

    client
        .send_turn(&mut session, "let's go to Paris, budget is $2000 dates December")
        .await
        .unwrap();
    client.send_turn(&mut session, "I like museums").await.unwrap();

    let trip = session.trip_details();
    assert_eq!(trip.destination.as_deref(), Some("Paris, budget is $2000 dates December"));
    assert_eq!(trip.budget.as_deref(), Some("is $2000 dates December"));
    assert_eq!(trip.dates.as_deref(), Some("December"));
    assert_eq!(session.entries().len(), 6);

    session.reset();
    assert_eq!(session.entries().len(), 1);
    assert!(session.trip_details().is_empty());
    assert_eq!(notifier.count(), 0);
}

#[tokio::test]
async fn test_edit_does_not_append_or_call() {
    let service = CannedService::new(vec![Ok("Hi!".to_string()), Ok("Noted".to_string())]);
    let notifier = Arc::new(RecordingNotifier::new());
    let client = ConversationClient::new(service, notifier);
    let mut session = Session::new();
    client.start_greeting(&mut session).await;
    client.send_turn(&mut session, "interests food").await.unwrap();

    let user = session.entries()[2].clone();
    session.begin_edit(user.id()).unwrap();
    let count = session.entries().len();

    // script is exhausted, so a call here would fail and notify
    let outcome = client.send_turn(&mut session, "interests wine").await.unwrap();

    assert_eq!(outcome, ReplyOutcome::Edited(user.id()));
    assert_eq!(session.entries().len(), count);
    let edited = session.entry(user.id()).unwrap();
    assert_eq!(edited.text(), "interests wine");
    assert_eq!(edited.created_at(), user.created_at());
    assert_eq!(session.trip_details().interests.as_deref(), Some("food"));
}

#[test]
fn test_sanitize_bold() {
    assert_eq!(sanitize("**Book early**"), "Book early");
}
