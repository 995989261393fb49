//! Chat session lifecycle with reinitialize-on-error recovery.
//!
//! Every conversation is keyed by a [`SessionKey`] and guarded by its own
//! async mutex, so turns on one conversation never interleave. A failed turn
//! always discards the handle and opens a fresh one before the error is
//! returned; repeated failures open a per-session circuit that rejects calls
//! until a cooldown has elapsed.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::llm::{ChatClient, ChatHandle, HandleId};

use super::error::{ChatError, ChatResult};
use super::prompt::{GREETING, PERSONA_PREAMBLE};

/// Longest accepted session key, in characters.
const MAX_KEY_CHARS: usize = 128;

/// Identifies one conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    /// Key of the conversation shared by callers that send no session id.
    pub const DEFAULT: &'static str = "default";

    /// Build a key from an optional client-supplied value.
    ///
    /// Blank or missing values select the shared default conversation.
    /// Overlong values are replaced by a name-based UUID of the full value.
    #[must_use]
    pub fn from_client(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(value) if value.chars().count() > MAX_KEY_CHARS => Self(format!(
                "long:{}",
                Uuid::new_v5(&Uuid::NAMESPACE_OID, value.as_bytes())
            )),
            Some(value) => Self(value.to_string()),
            None => Self::shared(),
        }
    }

    /// The shared default key.
    #[must_use]
    pub fn shared() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    /// Borrow the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Expiry and failure policy for conversations.
#[derive(Clone, Debug)]
pub struct SessionPolicy {
    /// Idle time after which a conversation is dropped.
    pub idle_ttl: Duration,
    /// Maximum number of live conversations.
    pub max_sessions: usize,
    /// Consecutive failed turns that open the circuit.
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls.
    pub cooldown: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(60 * 60),
            max_sessions: 1024,
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Default)]
struct Conversation {
    handle: Option<Box<dyn ChatHandle>>,
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

struct SessionEntry {
    conversation: Arc<Mutex<Conversation>>,
    last_used: Instant,
}

/// Owns conversation handles and applies the recovery policy.
pub struct ChatSessionManager {
    client: Arc<dyn ChatClient>,
    sessions: DashMap<SessionKey, SessionEntry>,
    policy: SessionPolicy,
}

impl ChatSessionManager {
    /// Create a manager without opening any conversation.
    #[must_use]
    pub fn new(client: Arc<dyn ChatClient>, policy: SessionPolicy) -> Self {
        Self {
            client,
            sessions: DashMap::new(),
            policy,
        }
    }

    /// Number of live conversations.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Identifier of the handle currently serving `key`, if any.
    pub async fn handle_id(&self, key: &SessionKey) -> Option<HandleId> {
        let conversation = self
            .sessions
            .get(key)
            .map(|entry| Arc::clone(&entry.conversation))?;
        let guard = conversation.lock().await;
        guard.handle.as_ref().map(|handle| handle.id())
    }

    /// Discard the conversation behind `key` and open a new one primed with the persona.
    ///
    /// Returns the canned greeting. A successful initialization also closes
    /// the session's circuit.
    ///
    /// # Errors
    /// Returns [`ChatError::Remote`] if the session cannot be opened or the
    /// persona preamble is rejected. The previous handle is discarded either way.
    pub async fn initialize(&self, key: &SessionKey) -> ChatResult<String> {
        let conversation = self.conversation(key);
        let mut guard = conversation.lock().await;
        let greeting = self.initialize_locked(key, &mut guard).await?;
        guard.consecutive_failures = 0;
        guard.open_until = None;
        Ok(greeting)
    }

    /// Send `text` on the conversation behind `key` and return the reply.
    ///
    /// Opens the conversation first if it has no handle. On failure the
    /// conversation is reinitialized once and the original error returned.
    ///
    /// # Errors
    /// Returns [`ChatError::CircuitOpen`] while the session is cooling down,
    /// or the [`ChatError::Remote`] that made the turn fail.
    pub async fn respond(&self, key: &SessionKey, text: &str) -> ChatResult<String> {
        let conversation = self.conversation(key);
        let mut guard = conversation.lock().await;

        if let Some(until) = guard.open_until {
            let now = Instant::now();
            if now < until {
                let retry_in_secs = until.saturating_duration_since(now).as_secs().max(1);
                debug!(session = %key, retry_in_secs, "Circuit open, rejecting turn");
                return Err(ChatError::CircuitOpen { retry_in_secs });
            }
        }

        match self.exchange(key, &mut guard, text).await {
            Ok(reply) => {
                guard.consecutive_failures = 0;
                guard.open_until = None;
                Ok(reply)
            }
            Err(err) => {
                error!(session = %key, error = %err, "Error getting response");
                guard.consecutive_failures = guard.consecutive_failures.saturating_add(1);
                if guard.consecutive_failures >= self.policy.failure_threshold {
                    guard.open_until = Some(Instant::now() + self.policy.cooldown);
                    warn!(
                        session = %key,
                        failures = guard.consecutive_failures,
                        cooldown_secs = self.policy.cooldown.as_secs(),
                        "Opening chat circuit"
                    );
                }

                if let Err(reinit) = self.initialize_locked(key, &mut guard).await {
                    warn!(session = %key, error = %reinit, "Recovery reinitialization failed");
                }
                Err(err)
            }
        }
    }

    async fn exchange(
        &self,
        key: &SessionKey,
        conversation: &mut Conversation,
        text: &str,
    ) -> ChatResult<String> {
        let mut handle = match conversation.handle.take() {
            Some(handle) => handle,
            None => self.open_handle(key).await?,
        };
        let result = handle.send(text).await;
        if result.is_ok() {
            debug!(session = %key, history = handle.history().len(), "Turn recorded");
        }
        conversation.handle = Some(handle);
        result.map_err(ChatError::from)
    }

    async fn initialize_locked(
        &self,
        key: &SessionKey,
        conversation: &mut Conversation,
    ) -> ChatResult<String> {
        conversation.handle = None;
        let handle = self.open_handle(key).await?;
        conversation.handle = Some(handle);
        Ok(GREETING.to_string())
    }

    async fn open_handle(&self, key: &SessionKey) -> ChatResult<Box<dyn ChatHandle>> {
        let mut handle = self
            .client
            .start_session(Vec::new())
            .await
            .inspect_err(|e| error!(session = %key, error = %e, "Error initializing chat"))?;

        let live_greeting = handle.send(PERSONA_PREAMBLE).await.inspect_err(|e| {
            error!(session = %key, error = %e, transient = e.is_transient(), "Persona preamble rejected");
        })?;

        debug!(session = %key, handle = %handle.id(), greeting = %live_greeting, "Model greeting");
        info!(session = %key, handle = %handle.id(), "Chat session initialized");
        Ok(handle)
    }

    fn conversation(&self, key: &SessionKey) -> Arc<Mutex<Conversation>> {
        let now = Instant::now();
        self.prune_idle(now);

        if !self.sessions.contains_key(key) && self.sessions.len() >= self.policy.max_sessions {
            self.evict_least_recent();
        }

        let mut entry = self
            .sessions
            .entry(key.clone())
            .or_insert_with(|| SessionEntry {
                conversation: Arc::new(Mutex::new(Conversation::default())),
                last_used: now,
            });
        entry.last_used = now;
        Arc::clone(&entry.conversation)
    }

    fn prune_idle(&self, now: Instant) {
        let ttl = self.policy.idle_ttl;
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| now.saturating_duration_since(entry.last_used) < ttl);
        let pruned = before.saturating_sub(self.sessions.len());
        if pruned > 0 {
            debug!(pruned, "Dropped idle chat sessions");
        }
    }

    fn evict_least_recent(&self) {
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.value().last_used)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            self.sessions.remove(&key);
            debug!(session = %key, "Evicted least recently used chat session");
        }
    }
}
