use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::PoisonError;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::error::PersistenceError;
use crate::session::Exchange;
use crate::session::Session;

/// How exchanges are laid out when a session document is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeShape {
    /// `exchanges: [{timestamp, input, output}]`
    Pairs,
    /// `messages: [{role, content}]`, alternating user/assistant.
    Messages,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// On-disk session document. Either exchange layout is accepted on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub session_id: String,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchanges: Option<Vec<Exchange>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<PersistedMessage>>,
}

impl PersistedSession {
    pub fn from_session(session: &Session, shape: ExchangeShape) -> Self {
        let (exchanges, messages) = match shape {
            ExchangeShape::Pairs => (Some(session.exchanges().to_vec()), None),
            ExchangeShape::Messages => (None, Some(exchanges_to_messages(session.exchanges()))),
        };
        Self {
            session_id: session.session_id().to_string(),
            created: session.created(),
            exchanges,
            messages,
        }
    }

    pub fn into_session(self) -> Session {
        let exchanges = match (self.exchanges, self.messages) {
            (Some(exchanges), _) => exchanges,
            (None, Some(messages)) => messages_to_exchanges(messages),
            (None, None) => Vec::new(),
        };
        Session::from_parts(self.session_id, self.created, exchanges)
    }
}

fn exchanges_to_messages(exchanges: &[Exchange]) -> Vec<PersistedMessage> {
    let mut messages = Vec::with_capacity(exchanges.len() * 2);
    for exchange in exchanges {
        messages.push(PersistedMessage {
            role: ROLE_USER.to_string(),
            content: exchange.input.clone(),
            timestamp: exchange.timestamp,
        });
        messages.push(PersistedMessage {
            role: ROLE_ASSISTANT.to_string(),
            content: exchange.output.clone(),
            timestamp: exchange.timestamp,
        });
    }
    messages
}

fn messages_to_exchanges(messages: Vec<PersistedMessage>) -> Vec<Exchange> {
    let mut exchanges = Vec::with_capacity(messages.len() / 2);
    let mut pending: Option<PersistedMessage> = None;
    for message in messages {
        if message.role == ROLE_USER {
            if pending.replace(message).is_some() {
                warn!("Skipping user message without an assistant reply");
            }
        } else if message.role == ROLE_ASSISTANT {
            match pending.take() {
                Some(user) => exchanges.push(Exchange {
                    input: user.content,
                    output: message.content,
                    timestamp: user.timestamp.or(message.timestamp),
                }),
                None => warn!("Skipping assistant message without a preceding request"),
            }
        } else {
            warn!(role = message.role.as_str(), "Skipping message with unknown role");
        }
    }
    if pending.is_some() {
        warn!("Skipping trailing user message without an assistant reply");
    }
    exchanges
}

/// Load/save access to the one session a strategy works with.
///
/// Implementations own where the session lives; callers never see a path.
pub trait SessionRepository {
    /// Never fails: a missing or unreadable session yields a fresh one.
    fn load(&self) -> Session;

    /// Overwrites the stored session with `session`.
    fn save(&self, session: &Session) -> Result<(), PersistenceError>;
}

/// Session stored as a single pretty-printed JSON file.
///
/// No locking: two concurrent runs against the same file race and the last
/// writer wins.
#[derive(Debug, Clone)]
pub struct JsonSessionStore {
    path: PathBuf,
    shape: ExchangeShape,
}

impl JsonSessionStore {
    pub fn new(path: impl AsRef<Path>, shape: ExchangeShape) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            shape,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn shape(&self) -> ExchangeShape {
        self.shape
    }

    fn read(&self) -> Result<Option<Session>, String> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&self.path).map_err(|err| err.to_string())?;
        let document = serde_json::from_slice::<PersistedSession>(&bytes)
            .map_err(|err| format!("parse {}: {err}", self.path.display()))?;
        Ok(Some(document.into_session()))
    }

    fn write(&self, session: &Session) -> Result<(), PersistenceError> {
        let document = PersistedSession::from_session(session, self.shape);
        let encoded = serde_json::to_vec_pretty(&document)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| PersistenceError::Write {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }
        std::fs::write(&self.path, encoded).map_err(|source| PersistenceError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl SessionRepository for JsonSessionStore {
    fn load(&self) -> Session {
        match self.read() {
            Ok(Some(session)) => {
                info!("Loaded context with {} previous exchanges", session.len());
                session
            }
            Ok(None) => {
                info!("No context at {}, starting a new session", self.path.display());
                Session::started_now()
            }
            Err(err) => {
                warn!("Error loading context: {err}");
                Session::started_now()
            }
        }
    }

    fn save(&self, session: &Session) -> Result<(), PersistenceError> {
        match self.write(session) {
            Ok(()) => {
                info!("Saved context with {} exchanges", session.len());
                Ok(())
            }
            Err(err) => {
                error!("Error saving context: {err}");
                Err(err)
            }
        }
    }
}

/// Session kept in memory; used where no file should be touched.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    session: Mutex<Option<Session>>,
    saves: Mutex<usize>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
            saves: Mutex::new(0),
        }
    }

    pub fn stored(&self) -> Option<Session> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionRepository for InMemorySessionStore {
    fn load(&self) -> Session {
        self.stored().unwrap_or_else(Session::started_now)
    }

    fn save(&self, session: &Session) -> Result<(), PersistenceError> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}
