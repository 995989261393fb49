//! Stub collaborators shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{ChatClient, ChatHandle, HandleId, LlmError, LlmResult, Message};
use crate::session::prompt::PERSONA_PREAMBLE;
use crate::speech::{AudioClip, SpeechTranscriber, TranscriptionError};

#[derive(Default)]
struct StubState {
    fail_start: AtomicBool,
    fail_turns: AtomicBool,
    started: AtomicUsize,
    preambles: AtomicUsize,
    turns: Mutex<Vec<(HandleId, String)>>,
    turn_delay: Mutex<Duration>,
    events: Mutex<Vec<String>>,
}

impl StubState {
    fn record_event(&self, event: String) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Chat client answering every user turn with a fixed reply.
pub(crate) struct StubChatClient {
    reply: String,
    state: Arc<StubState>,
}

impl StubChatClient {
    pub(crate) fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            state: Arc::new(StubState::default()),
        }
    }

    /// Make `start_session` fail.
    pub(crate) fn set_fail_start(&self, fail: bool) {
        self.state.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Make every user turn fail; the persona preamble still succeeds.
    pub(crate) fn set_fail_turns(&self, fail: bool) {
        self.state.fail_turns.store(fail, Ordering::SeqCst);
    }

    /// Suspend every user turn for `delay` between its begin and end events.
    pub(crate) fn set_turn_delay(&self, delay: Duration) {
        if let Ok(mut current) = self.state.turn_delay.lock() {
            *current = delay;
        }
    }

    /// `begin <text>` / `end <text>` markers of user turns, in the order they happened.
    pub(crate) fn turn_events(&self) -> Vec<String> {
        self.state
            .events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// `start_session` calls, including failed ones.
    pub(crate) fn sessions_started(&self) -> usize {
        self.state.started.load(Ordering::SeqCst)
    }

    pub(crate) fn preambles_sent(&self) -> usize {
        self.state.preambles.load(Ordering::SeqCst)
    }

    /// Successful user turns with the handle that served them.
    pub(crate) fn user_turns(&self) -> Vec<(HandleId, String)> {
        self.state
            .turns
            .lock()
            .map(|turns| turns.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatClient for StubChatClient {
    async fn start_session(&self, history: Vec<Message>) -> LlmResult<Box<dyn ChatHandle>> {
        self.state.started.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_start.load(Ordering::SeqCst) {
            return Err(LlmError::Status {
                status: 503,
                message: "stub unavailable".to_string(),
            });
        }
        Ok(Box::new(StubHandle {
            id: HandleId::new(),
            history,
            reply: self.reply.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct StubHandle {
    id: HandleId,
    history: Vec<Message>,
    reply: String,
    state: Arc<StubState>,
}

#[async_trait]
impl ChatHandle for StubHandle {
    fn id(&self) -> HandleId {
        self.id
    }

    fn history(&self) -> &[Message] {
        &self.history
    }

    async fn send(&mut self, text: &str) -> LlmResult<String> {
        let reply = if text == PERSONA_PREAMBLE {
            self.state.preambles.fetch_add(1, Ordering::SeqCst);
            "Hello! I'm your eco guide.".to_string()
        } else {
            if self.state.fail_turns.load(Ordering::SeqCst) {
                return Err(LlmError::Status {
                    status: 500,
                    message: "stub failure".to_string(),
                });
            }
            self.state.record_event(format!("begin {text}"));
            let delay = self
                .state
                .turn_delay
                .lock()
                .map(|delay| *delay)
                .unwrap_or_default();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.state.record_event(format!("end {text}"));
            if let Ok(mut turns) = self.state.turns.lock() {
                turns.push((self.id, text.to_string()));
            }
            self.reply.clone()
        };

        self.history.push(Message::user(text));
        self.history.push(Message::model(reply.clone()));
        Ok(reply)
    }
}

/// Transcriber returning a fixed transcript, or failing when it has none.
pub(crate) struct StubTranscriber {
    transcript: Option<String>,
    calls: AtomicUsize,
}

impl StubTranscriber {
    pub(crate) fn new(transcript: Option<&str>) -> Self {
        Self {
            transcript: transcript.map(str::to_string),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechTranscriber for StubTranscriber {
    async fn transcribe(&self, _clip: AudioClip) -> Result<String, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.transcript
            .clone()
            .ok_or(TranscriptionError::Unrecognized)
    }
}
