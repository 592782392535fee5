use std::sync::Arc;
use std::time::{Duration, Instant};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tripmate_core::config::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use tripmate_core::conversation::{quick_reply_prompt, QUICK_REPLY_TOPICS};
use tripmate_core::{
    Config, ConversationClient, GeminiClient, KeySource, Notification, Notifier, PendingReply,
    PreparedTurn, ReplyKind, ReplyOutcome, ServiceError, Session, Severity,
};
use crate::animation::FadeTable;

/// How long a notification banner stays up
const BANNER_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Messages,
    QuickReplies,
    Input,
}

#[derive(Debug, Clone)]
pub struct Banner {
    pub notification: Notification,
    pub shown_at: Instant,
}

/// A completion call running on a background task
pub struct InFlight {
    pub pending: PendingReply,
    pub task: JoinHandle<Result<String, ServiceError>>,
}

/// Connection settings resolved from flags, environment, and the config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub key_source: Option<KeySource>,
    pub model: String,
    pub base_url: String,
}

impl Settings {
    /// Flags win over the environment, which wins over the config file
    pub fn resolve(
        config: &Config,
        api_key_flag: Option<String>,
        model_flag: Option<String>,
        base_url_flag: Option<String>,
    ) -> Self {
        let (api_key, key_source) = match api_key_flag.filter(|k| !k.is_empty()) {
            Some(key) => (Some(key), Some(KeySource::Flag)),
            None => match config.resolve_api_key() {
                Some((key, source)) => (Some(key), Some(source)),
                None => (None, None),
            },
        };

        Self {
            api_key,
            key_source,
            model: model_flag.unwrap_or_else(|| config.model_or_default().to_string()),
            base_url: base_url_flag.unwrap_or_else(|| config.base_url_or_default().to_string()),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            key_source: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Conversation
    pub session: Session,
    pub client: Option<ConversationClient>,
    notifier: Arc<dyn Notifier>,
    pub settings: Settings,
    pub in_flight: Option<InFlight>,
    pub greeting_failed: bool,

    // Input line
    pub input: String,
    pub input_cursor: usize,

    // Presentation state
    pub fades: FadeTable,
    pub animation_frame: u8,
    pub show_quick_replies: bool,
    pub quick_reply_idx: usize,
    /// Button positions from the last render, in topic order
    pub quick_reply_areas: Vec<Rect>,
    pub selected_entry: Option<usize>,
    pub banner: Option<Banner>,

    // Chat scrolling (sizes recorded by the renderer)
    pub chat_scroll: u16,
    pub follow_bottom: bool,
    pub chat_height: u16,
    pub chat_total_lines: u16,
    pub chat_area: Option<Rect>,

    // Model picker popup
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,

    // API key popup
    pub show_api_key_input: bool,
    pub api_key_input: String,
    pub api_key_input_cursor: usize,
}

impl App {
    pub fn new(settings: Settings, notifier: Arc<dyn Notifier>) -> Self {
        let client = build_client(&settings, &notifier);
        Self::with_client(settings, client, notifier)
    }

    pub fn with_client(
        settings: Settings,
        client: Option<ConversationClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let show_api_key_input = client.is_none();

        Self {
            should_quit: false,
            input_mode: if show_api_key_input { InputMode::Normal } else { InputMode::Editing },
            focus: FocusPane::Input,

            session: Session::new(),
            client,
            notifier,
            settings,
            in_flight: None,
            greeting_failed: false,

            input: String::new(),
            input_cursor: 0,

            fades: FadeTable::new(),
            animation_frame: 0,
            show_quick_replies: false,
            quick_reply_idx: 0,
            quick_reply_areas: Vec::new(),
            selected_entry: None,
            banner: None,

            chat_scroll: 0,
            follow_bottom: true,
            chat_height: 0,
            chat_total_lines: 0,
            chat_area: None,

            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),

            show_api_key_input,
            api_key_input: String::new(),
            api_key_input_cursor: 0,
        }
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight.is_some()
    }

    // Conversation flow

    /// Issue the opening call if the session has not been seeded yet
    pub fn start_greeting(&mut self) {
        if self.is_sending() || !self.session.is_empty() {
            return;
        }
        let Some(client) = self.client.clone() else {
            return;
        };
        self.greeting_failed = false;
        let (pending, request) = client.greeting_call(&self.session);
        self.dispatch(client, pending, request);
    }

    /// Send the input line (or commit the pending edit with it)
    pub fn submit(&mut self) {
        let text = self.input.clone();
        if self.submit_text(&text) {
            self.input.clear();
            self.input_cursor = 0;
        }
    }

    /// Returns true when the text was consumed (sent or used for an edit)
    pub fn submit_text(&mut self, text: &str) -> bool {
        if self.is_sending() {
            return false;
        }
        let Some(client) = self.client.clone() else {
            self.open_api_key_input();
            return false;
        };

        match client.prepare_turn(&mut self.session, text) {
            Ok(PreparedTurn::Edited(id)) => {
                tracing::debug!(entry = %id, "edit committed");
                true
            }
            Ok(PreparedTurn::Call { pending, request, .. }) => {
                self.dispatch(client, pending, request);
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "submit rejected");
                false
            }
        }
    }

    pub fn send_quick_reply(&mut self, idx: usize) {
        let Some(topic) = QUICK_REPLY_TOPICS.get(idx) else {
            return;
        };
        let text = quick_reply_prompt(topic, self.session.trip_details());
        self.submit_text(&text);
    }

    fn dispatch(
        &mut self,
        client: ConversationClient,
        pending: PendingReply,
        request: tripmate_core::CompletionRequest,
    ) {
        let task = tokio::spawn(async move { client.complete(&request).await });
        self.in_flight = Some(InFlight { pending, task });
        self.follow_bottom = true;
    }

    /// Apply the background call's result once it has finished
    pub async fn poll_reply(&mut self) {
        let in_flight = match self.in_flight.take() {
            Some(f) if f.task.is_finished() => f,
            other => {
                self.in_flight = other;
                return;
            }
        };

        let result = in_flight.task.await.unwrap_or_else(|e| {
            Err(ServiceError::unknown(format!("completion task failed: {}", e)))
        });
        self.finish(&in_flight.pending, result);
    }

    fn finish(&mut self, pending: &PendingReply, result: Result<String, ServiceError>) {
        let Some(client) = self.client.clone() else {
            tracing::debug!("reply arrived without a client, dropping");
            return;
        };

        match (pending.kind(), client.apply(&mut self.session, pending, result)) {
            (ReplyKind::Turn, ReplyOutcome::Replied(_)) => self.show_quick_replies = true,
            (ReplyKind::Greeting, ReplyOutcome::Failed) => self.greeting_failed = true,
            // Cleared while greeting: nothing else will seed the session
            (ReplyKind::Greeting, ReplyOutcome::Discarded) if self.session.is_empty() => {
                tracing::debug!("greeting discarded by reset, greeting again");
                self.start_greeting();
            }
            _ => {}
        }
        self.follow_bottom = true;
    }

    pub fn retry_greeting(&mut self) {
        if self.session.is_empty() {
            self.start_greeting();
        }
    }

    /// Clear the conversation back to the date marker
    pub fn reset(&mut self) {
        self.session.reset();
        self.fades.reset(self.session.entries());
        self.show_quick_replies = false;
        self.quick_reply_idx = 0;
        self.selected_entry = None;
        self.input.clear();
        self.input_cursor = 0;
        self.chat_scroll = 0;
        self.follow_bottom = true;
        if self.focus == FocusPane::QuickReplies {
            self.focus = FocusPane::Messages;
        }
    }

    // Editing

    /// Load the selected user message into the input for editing
    pub fn begin_edit_selected(&mut self) {
        let Some(entry) = self.selected_entry.and_then(|i| self.session.entries().get(i)) else {
            return;
        };
        let id = entry.id();
        if let Some(text) = self.session.begin_edit(id) {
            self.input_cursor = text.chars().count();
            self.input = text;
            self.focus = FocusPane::Input;
            self.input_mode = InputMode::Editing;
        }
    }

    pub fn cancel_edit(&mut self) {
        if self.session.editing().is_some() {
            self.session.cancel_edit();
            self.input.clear();
            self.input_cursor = 0;
        }
    }

    // Presentation

    pub fn on_tick(&mut self) {
        if self.is_sending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.fades.sync(self.session.entries());
        self.fades.advance();

        if self
            .banner
            .as_ref()
            .map(|b| b.shown_at.elapsed() >= BANNER_TTL)
            .unwrap_or(false)
        {
            self.banner = None;
        }
    }

    pub fn show_notice(&mut self, notification: Notification) {
        self.banner = Some(Banner {
            notification,
            shown_at: Instant::now(),
        });
    }

    pub fn select_next_entry(&mut self) {
        let len = self.session.entries().len();
        if len == 0 {
            return;
        }
        let next = self.selected_entry.map(|i| (i + 1).min(len - 1)).unwrap_or(len - 1);
        self.selected_entry = Some(next);
    }

    pub fn select_prev_entry(&mut self) {
        let len = self.session.entries().len();
        if len == 0 {
            return;
        }
        let prev = self.selected_entry.map(|i| i.saturating_sub(1)).unwrap_or(len - 1);
        self.selected_entry = Some(prev);
    }

    pub fn quick_reply_next(&mut self) {
        self.quick_reply_idx = (self.quick_reply_idx + 1).min(QUICK_REPLY_TOPICS.len() - 1);
    }

    pub fn quick_reply_prev(&mut self) {
        self.quick_reply_idx = self.quick_reply_idx.saturating_sub(1);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.chat_total_lines.saturating_sub(self.chat_height);
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
        self.follow_bottom = self.chat_scroll >= max;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
        self.follow_bottom = false;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_bottom = true;
    }

    // Model picker methods

    pub fn open_model_picker(&mut self) {
        self.available_models = GeminiClient::list_models();
        if !self.available_models.contains(&self.settings.model) {
            self.available_models.insert(0, self.settings.model.clone());
        }
        let current_idx = self
            .available_models
            .iter()
            .position(|m| m == &self.settings.model)
            .unwrap_or(0);
        self.model_picker_state.select(Some(current_idx));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        let Some(model) = self
            .model_picker_state
            .selected()
            .and_then(|i| self.available_models.get(i))
            .cloned()
        else {
            return;
        };
        self.show_model_picker = false;
        if model == self.settings.model {
            return;
        }

        self.settings.model = model.clone();
        self.client = build_client(&self.settings, &self.notifier);
        if let Err(e) = Config::save_model(&model) {
            tracing::warn!(error = %e, "failed to save model to config");
        }
        self.show_notice(Notification::new("Model", format!("Using {}", model), Severity::Info));
    }

    // API key popup

    pub fn open_api_key_input(&mut self) {
        self.show_api_key_input = true;
        self.api_key_input.clear();
        self.api_key_input_cursor = 0;
    }

    pub fn close_api_key_input(&mut self) {
        self.show_api_key_input = false;
        self.api_key_input.clear();
        self.api_key_input_cursor = 0;
    }

    /// Use the typed key, persist it, and greet if nothing has been said yet
    pub fn save_api_key(&mut self) {
        let key = self.api_key_input.trim().to_string();
        self.close_api_key_input();
        if key.is_empty() {
            return;
        }

        self.settings.api_key = Some(key.clone());
        self.settings.key_source = Some(KeySource::Config);
        self.client = build_client(&self.settings, &self.notifier);

        match Config::save_api_key(&key) {
            Ok(()) => self.show_notice(Notification::new("Saved", "API key stored", Severity::Success)),
            Err(e) => {
                tracing::warn!(error = %e, "failed to save API key");
                self.show_notice(Notification::new(
                    "Warning",
                    "API key is in use but could not be saved",
                    Severity::Warning,
                ));
            }
        }

        self.input_mode = InputMode::Editing;
        self.focus = FocusPane::Input;
        self.start_greeting();
    }
}

fn build_client(settings: &Settings, notifier: &Arc<dyn Notifier>) -> Option<ConversationClient> {
    let key = settings.api_key.as_deref()?;
    let service = Arc::new(GeminiClient::with_base_url(key, &settings.model, &settings.base_url));
    Some(ConversationClient::new(service, notifier.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tripmate_core::{CompletionRequest, CompletionService, RecordingNotifier};

    struct Scripted {
        replies: Mutex<VecDeque<Result<String, ServiceError>>>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionService for Scripted {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ServiceError::unknown("script exhausted")))
        }

        fn model_id(&self) -> &str {
            "gemini-test"
        }
    }

    fn app_with(replies: Vec<Result<String, ServiceError>>) -> (App, Arc<Scripted>, Arc<RecordingNotifier>) {
        let service = Arc::new(Scripted {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        });
        let notifier = Arc::new(RecordingNotifier::new());
        let client = ConversationClient::new(service.clone(), notifier.clone());
        let app = App::with_client(Settings::default(), Some(client), notifier.clone());
        (app, service, notifier)
    }

    async fn settle(app: &mut App) {
        if let Some(in_flight) = app.in_flight.take() {
            let result = in_flight.task.await.unwrap();
            app.finish(&in_flight.pending, result);
        }
    }

    #[tokio::test]
    async fn test_greeting_then_turn_shows_quick_replies() {
        let (mut app, _, _) = app_with(vec![Ok("Hello!".to_string()), Ok("Great choice".to_string())]);
        app.start_greeting();
        assert!(app.is_sending());
        settle(&mut app).await;
        assert_eq!(app.session.entries().len(), 2);
        assert!(!app.show_quick_replies);

        app.input = "go to Seoul".to_string();
        app.submit();
        assert!(app.input.is_empty());
        settle(&mut app).await;

        assert_eq!(app.session.entries().len(), 4);
        assert!(app.show_quick_replies);
    }

    #[tokio::test]
    async fn test_submit_blocked_while_sending() {
        let (mut app, _, _) = app_with(vec![Ok("Hello!".to_string())]);
        app.start_greeting();
        assert!(!app.submit_text("go to Oslo"));
        assert!(app.session.is_empty());
        settle(&mut app).await;
    }

    #[tokio::test]
    async fn test_failed_greeting_can_be_retried() {
        let (mut app, _, notifier) = app_with(vec![
            Err(ServiceError::network("offline")),
            Ok("Hello again".to_string()),
        ]);
        app.start_greeting();
        settle(&mut app).await;
        assert!(app.greeting_failed);
        assert!(app.session.is_empty());
        assert_eq!(notifier.count(), 1);

        app.retry_greeting();
        settle(&mut app).await;
        assert!(!app.greeting_failed);
        assert_eq!(app.session.entries().len(), 2);
    }

    #[tokio::test]
    async fn test_quick_reply_uses_destination() {
        let (mut app, service, _) = app_with(vec![
            Ok("Hello!".to_string()),
            Ok("Nice".to_string()),
            Ok("Fly direct".to_string()),
        ]);
        app.start_greeting();
        settle(&mut app).await;
        app.submit_text("we go to Rome");
        settle(&mut app).await;

        app.send_quick_reply(0);
        settle(&mut app).await;

        let prompts = service.prompts.lock().unwrap().clone();
        assert!(prompts[2].contains("Current message: Tell me about flights for my trip to Rome"));
        assert_eq!(app.session.entries().len(), 6);
    }

    #[tokio::test]
    async fn test_edit_selected_message() {
        let (mut app, service, _) = app_with(vec![Ok("Hello!".to_string()), Ok("ok".to_string())]);
        app.start_greeting();
        settle(&mut app).await;
        app.submit_text("dates March");
        settle(&mut app).await;

        // greeting is not editable
        app.selected_entry = Some(1);
        app.begin_edit_selected();
        assert!(app.session.editing().is_none());

        app.selected_entry = Some(2);
        app.begin_edit_selected();
        assert_eq!(app.input, "dates March");
        assert_eq!(app.input_cursor, 11);

        app.input = "dates April".to_string();
        app.submit();
        assert!(!app.is_sending());
        assert_eq!(app.session.entries()[2].text(), "dates April");
        assert_eq!(service.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reset_discards_late_reply() {
        let (mut app, _, notifier) = app_with(vec![Ok("Hello!".to_string()), Ok("late".to_string())]);
        app.start_greeting();
        settle(&mut app).await;
        app.submit_text("budget 100");
        app.reset();
        settle(&mut app).await;

        assert_eq!(app.session.entries().len(), 1);
        assert!(!app.show_quick_replies);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_reset_during_greeting_greets_again() {
        let (mut app, service, notifier) = app_with(vec![
            Ok("first hello".to_string()),
            Ok("second hello".to_string()),
        ]);
        app.start_greeting();
        app.reset();
        settle(&mut app).await;

        assert!(app.is_sending());
        assert!(!app.greeting_failed);
        settle(&mut app).await;

        assert_eq!(app.session.entries().len(), 2);
        assert_eq!(app.session.entries()[1].text(), "second hello");
        assert_eq!(service.prompts.lock().unwrap().len(), 2);
        assert_eq!(notifier.count(), 0);
    }

    #[test]
    fn test_missing_key_opens_popup() {
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::new());
        let mut app = App::new(Settings::default(), notifier);
        assert!(app.client.is_none());
        assert!(app.show_api_key_input);

        app.close_api_key_input();
        app.input = "go to Cairo".to_string();
        app.submit();
        assert!(app.show_api_key_input);
        assert!(app.session.is_empty());
    }

    #[test]
    fn test_settings_precedence() {
        let config = Config {
            api_key: Some("from-file".to_string()),
            model: Some("gemini-1.5-pro".to_string()),
            base_url: None,
        };
        let settings = Settings::resolve(&config, Some("from-flag".to_string()), None, None);
        assert_eq!(settings.api_key.as_deref(), Some("from-flag"));
        assert_eq!(settings.key_source, Some(KeySource::Flag));
        assert_eq!(settings.model, "gemini-1.5-pro");
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);

        let settings = Settings::resolve(&Config::new(), None, Some("gemini-2.0-flash".to_string()), None);
        assert_eq!(settings.model, "gemini-2.0-flash");
    }

    #[test]
    fn test_entry_selection_clamps() {
        let (mut app, _, _) = app_with(vec![]);
        app.select_next_entry();
        assert_eq!(app.selected_entry, None);

        app.session.append_assistant_message("a");
        app.session.append_assistant_message("b");
        app.select_prev_entry();
        assert_eq!(app.selected_entry, Some(1));
        app.select_prev_entry();
        app.select_prev_entry();
        assert_eq!(app.selected_entry, Some(0));
        app.select_next_entry();
        app.select_next_entry();
        assert_eq!(app.selected_entry, Some(1));
    }
}
