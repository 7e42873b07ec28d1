//! Recording mocks shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use gptbot_router::types::{
    ChatId, InboundCallback, InboundMessage, Keyboard, MessageContent, MessageId, SentMessage, UserId,
};
use gptbot_router::{
    BotError, BotRouter, BotServices, ChatTransport, CompletionGateway, CompletionReply,
    CompletionRequest, DialogClear, Eligibility, FlowSettings, HistoryEntry, InMemorySessionStore,
    ModelId, Result, TokenAccounting, TokenBalance,
};

/// Everything the transport was asked to do, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Text { chat_id: ChatId, text: String },
    Keyboard { chat_id: ChatId, text: String, keyboard: Keyboard },
    EditKeyboard { message: SentMessage, keyboard: Keyboard },
    Delete(SentMessage),
    Answer { callback_id: String, text: Option<String> },
    Typing(ChatId),
}

#[derive(Default)]
pub struct MockTransport {
    events: Mutex<Vec<Event>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    next_id: AtomicI32,
    fail_edits: AtomicBool,
}

impl MockTransport {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn answers(&self) -> Vec<Option<String>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Answer { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<SentMessage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Delete(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn add_file(&self, file_id: &str, bytes: Vec<u8>) {
        self.files.lock().insert(file_id.to_string(), bytes);
    }

    /// Make `edit_keyboard` fail, as for a deleted or too old message
    pub fn fail_edits(&self) {
        self.fail_edits.store(true, Ordering::SeqCst);
    }

    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }

    fn next_message(&self, chat_id: ChatId) -> SentMessage {
        SentMessage {
            chat_id,
            message_id: MessageId(1000 + self.next_id.fetch_add(1, Ordering::SeqCst)),
        }
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<SentMessage> {
        self.record(Event::Text {
            chat_id,
            text: text.to_string(),
        });
        Ok(self.next_message(chat_id))
    }

    async fn send_keyboard(&self, chat_id: ChatId, text: &str, keyboard: &Keyboard) -> Result<SentMessage> {
        self.record(Event::Keyboard {
            chat_id,
            text: text.to_string(),
            keyboard: keyboard.clone(),
        });
        Ok(self.next_message(chat_id))
    }

    async fn edit_keyboard(&self, message: SentMessage, keyboard: &Keyboard) -> Result<()> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(BotError::Transport("message can't be edited".to_string()));
        }
        self.record(Event::EditKeyboard {
            message,
            keyboard: keyboard.clone(),
        });
        Ok(())
    }

    async fn delete_message(&self, message: SentMessage) -> Result<()> {
        self.record(Event::Delete(message));
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.record(Event::Answer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }

    async fn send_typing(&self, chat_id: ChatId) -> Result<()> {
        self.record(Event::Typing(chat_id));
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .get(file_id)
            .cloned()
            .ok_or_else(|| BotError::Transport(format!("file {} not found", file_id)))
    }
}

/// How the mock gateway answers
#[derive(Debug, Clone)]
pub enum GatewayBehavior {
    Reply(CompletionReply),
    /// Never resolves
    Hang,
    Fault,
}

pub struct MockGateway {
    behavior: Mutex<GatewayBehavior>,
    requests: Mutex<Vec<CompletionRequest>>,
    history: Mutex<Vec<HistoryEntry>>,
    history_clears: AtomicUsize,
    /// When set, each call waits for a notification before answering
    gate: Mutex<Option<Arc<Notify>>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            behavior: Mutex::new(GatewayBehavior::Reply(CompletionReply::answered("hi", 5))),
            requests: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            history_clears: AtomicUsize::new(0),
            gate: Mutex::new(None),
        }
    }
}

impl MockGateway {
    pub fn set_behavior(&self, behavior: GatewayBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn set_gate(&self, gate: Arc<Notify>) {
        *self.gate.lock() = Some(gate);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn set_history(&self, entries: Vec<HistoryEntry>) {
        *self.history.lock() = entries;
    }

    pub fn history_clears(&self) -> usize {
        self.history_clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionGateway for MockGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionReply> {
        self.requests.lock().push(request);

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let behavior = self.behavior.lock().clone();
        match behavior {
            GatewayBehavior::Reply(reply) => Ok(reply),
            GatewayBehavior::Hang => std::future::pending().await,
            GatewayBehavior::Fault => Err(BotError::Gateway("connection reset".to_string())),
        }
    }

    async fn history(&self, _user_id: UserId) -> Result<Vec<HistoryEntry>> {
        Ok(self.history.lock().clone())
    }

    async fn clear_history(&self, _user_id: UserId) -> Result<()> {
        self.history_clears.fetch_add(1, Ordering::SeqCst);
        self.history.lock().clear();
        Ok(())
    }
}

pub struct MockAccounting {
    /// Balances returned by successive `tokens` calls
    balances: Mutex<VecDeque<i64>>,
    fail_tokens: AtomicBool,
    clear_result: Mutex<DialogClear>,
    clears: Mutex<Vec<(UserId, ModelId)>>,
    token_reads: Mutex<Vec<(UserId, ModelId)>>,
}

impl Default for MockAccounting {
    fn default() -> Self {
        Self {
            balances: Mutex::new(VecDeque::new()),
            fail_tokens: AtomicBool::new(false),
            clear_result: Mutex::new(DialogClear::Cleared),
            clears: Mutex::new(Vec::new()),
            token_reads: Mutex::new(Vec::new()),
        }
    }
}

impl MockAccounting {
    pub fn push_balances(&self, balances: &[i64]) {
        self.balances.lock().extend(balances.iter().copied());
    }

    pub fn fail_tokens(&self) {
        self.fail_tokens.store(true, Ordering::SeqCst);
    }

    pub fn set_clear_result(&self, result: DialogClear) {
        *self.clear_result.lock() = result;
    }

    pub fn clears(&self) -> Vec<(UserId, ModelId)> {
        self.clears.lock().clone()
    }

    pub fn token_reads(&self) -> Vec<(UserId, ModelId)> {
        self.token_reads.lock().clone()
    }
}

#[async_trait]
impl TokenAccounting for MockAccounting {
    async fn tokens(&self, user_id: UserId, model: ModelId) -> Result<TokenBalance> {
        if self.fail_tokens.load(Ordering::SeqCst) {
            return Err(BotError::Gateway("token service unavailable".to_string()));
        }
        self.token_reads.lock().push((user_id, model));
        let tokens = self.balances.lock().pop_front().unwrap_or(0);
        Ok(TokenBalance { tokens })
    }

    async fn clear_dialog(&self, user_id: UserId, model: ModelId) -> Result<DialogClear> {
        self.clears.lock().push((user_id, model));
        Ok(*self.clear_result.lock())
    }
}

pub struct MockEligibility {
    agreed: AtomicBool,
    member: AtomicBool,
}

impl Default for MockEligibility {
    fn default() -> Self {
        Self {
            agreed: AtomicBool::new(true),
            member: AtomicBool::new(true),
        }
    }
}

impl MockEligibility {
    pub fn set_agreed(&self, agreed: bool) {
        self.agreed.store(agreed, Ordering::SeqCst);
    }

    pub fn set_member(&self, member: bool) {
        self.member.store(member, Ordering::SeqCst);
    }
}

#[async_trait]
impl Eligibility for MockEligibility {
    async fn check_agreement(&self, _message: &InboundMessage) -> Result<bool> {
        Ok(self.agreed.load(Ordering::SeqCst))
    }

    async fn check_membership(&self, _message: &InboundMessage) -> Result<bool> {
        Ok(self.member.load(Ordering::SeqCst))
    }
}

/// Router wired to recording mocks
pub struct Harness {
    pub store: Arc<InMemorySessionStore>,
    pub gateway: Arc<MockGateway>,
    pub accounting: Arc<MockAccounting>,
    pub eligibility: Arc<MockEligibility>,
    pub transport: Arc<MockTransport>,
    pub router: BotRouter,
}

pub fn fast_settings() -> FlowSettings {
    FlowSettings {
        settle_delay: Duration::ZERO,
        completion_timeout: Duration::from_secs(5),
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(fast_settings())
    }

    pub fn with_settings(settings: FlowSettings) -> Self {
        let store = Arc::new(InMemorySessionStore::new());
        let gateway = Arc::new(MockGateway::default());
        let accounting = Arc::new(MockAccounting::default());
        let eligibility = Arc::new(MockEligibility::default());
        let transport = Arc::new(MockTransport::default());

        let router = BotRouter::new(
            BotServices {
                store: store.clone(),
                gateway: gateway.clone(),
                accounting: accounting.clone(),
                eligibility: eligibility.clone(),
                transport: transport.clone(),
            },
            settings,
        );

        Self {
            store,
            gateway,
            accounting,
            eligibility,
            transport,
            router,
        }
    }
}

pub fn message(user: i64, content: MessageContent) -> InboundMessage {
    InboundMessage {
        user_id: UserId(user),
        chat_id: ChatId(user),
        message_id: MessageId(1),
        content,
    }
}

pub fn text_message(user: i64, text: &str) -> InboundMessage {
    message(user, MessageContent::Text(text.to_string()))
}

pub fn keyboard_message(user: i64) -> SentMessage {
    SentMessage {
        chat_id: ChatId(user),
        message_id: MessageId(77),
    }
}

pub fn callback(user: i64, data: &str) -> InboundCallback {
    InboundCallback {
        id: format!("cb-{}", user),
        user_id: UserId(user),
        message: Some(keyboard_message(user)),
        data: Some(data.to_string()),
    }
}
