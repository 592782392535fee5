pub mod ai;
pub mod config;
pub mod conversation;
pub mod error;
pub mod notify;
pub mod provider;
pub mod session;
pub mod state;
pub mod trip;

// Re-export main types for convenience
pub use ai::GeminiClient;
pub use config::{Config, KeySource};
pub use conversation::{ConversationClient, PendingReply, PreparedTurn, ReplyKind, ReplyOutcome};
pub use error::{ChatError, ServiceError, ServiceErrorKind};
pub use notify::{Notification, Notifier, RecordingNotifier, Severity};
pub use provider::{CompletionRequest, CompletionService, SpeakerRole, Turn};
pub use session::Session;
pub use state::{ChatEntry, EntryId};
pub use trip::TripDetails;
