//! Conversation sessions and their on-disk store.
//!
//! A [`Session`] is the unit of persistence: the ordered message history plus
//! the endpoint/model/mode scalars and token counters. [`FileSessionStore`]
//! keeps one pretty-printed JSON document per session and replaces it
//! atomically on every save.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::message::{ConversationMessage, Role, ToolCallRequest};
use super::provider_client::TokenUsage;

/// Cumulative token counters for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    /// Prompt size of the most recent request; drives context usage.
    #[serde(default)]
    pub last_prompt_tokens: u32,
    /// Whether the latest numbers came from an estimate rather than the
    /// provider.
    #[serde(default)]
    pub estimated: bool,
}

impl UsageCounters {
    pub fn record(&mut self, usage: TokenUsage, estimated: bool) {
        self.prompt_tokens += u64::from(usage.prompt_tokens);
        self.completion_tokens += u64::from(usage.completion_tokens);
        self.total_tokens += u64::from(usage.total_tokens);
        self.last_prompt_tokens = usage.prompt_tokens.saturating_add(usage.completion_tokens);
        self.estimated = estimated;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub endpoint: String,
    pub model: String,
    #[serde(default)]
    pub nsfw_mode: bool,
    #[serde(default)]
    pub usage: UsageCounters,
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
}

impl Session {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_session_id(now),
            created_at: now,
            updated_at: now,
            endpoint: endpoint.into(),
            model: model.into(),
            nsfw_mode: false,
            usage: UsageCounters::default(),
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, message: ConversationMessage) {
        self.messages.push(message);
        self.touch();
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
        self.usage = UsageCounters::default();
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Calls of the trailing assistant message that never got a `tool`
    /// reply. Only a run that exited mid-turn leaves these behind.
    pub fn unanswered_tool_calls(&self) -> Vec<ToolCallRequest> {
        let Some(position) = self
            .messages
            .iter()
            .rposition(|message| message.role != Role::Tool)
        else {
            return Vec::new();
        };
        let message = &self.messages[position];
        let Some(calls) = message.tool_calls.as_deref() else {
            return Vec::new();
        };
        if message.role != Role::Assistant {
            return Vec::new();
        }

        let answered: Vec<&str> = self.messages[position + 1..]
            .iter()
            .filter_map(|reply| reply.tool_call_id.as_deref())
            .collect();
        calls
            .iter()
            .filter(|call| !answered.contains(&call.id.as_str()))
            .cloned()
            .collect()
    }
}

/// One line of `/session list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: String,
    pub updated_at: DateTime<Utc>,
    pub endpoint: String,
    pub model: String,
    pub message_count: usize,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            updated_at: session.updated_at,
            endpoint: session.endpoint.clone(),
            model: session.model.clone(),
            message_count: session.messages.len(),
        }
    }
}

fn new_session_id(now: DateTime<Utc>) -> String {
    let mut suffix = [0u8; 3];
    let suffix = match getrandom::fill(&mut suffix) {
        Ok(()) => suffix.iter().map(|byte| format!("{byte:02x}")).collect(),
        Err(_) => format!("{:06x}", now.timestamp_subsec_micros() & 0xff_ffff),
    };
    format!("{}-{}", now.format("%Y%m%d-%H%M%S"), suffix)
}

#[derive(Debug)]
pub enum PersistenceError {
    Io { path: PathBuf, source: std::io::Error },
    Serialize { path: PathBuf, source: serde_json::Error },
    NotFound(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Io { path, source } => {
                write!(f, "Session I/O failed at {}: {}", path.display(), source)
            }
            PersistenceError::Serialize { path, source } => {
                write!(f, "Session data invalid at {}: {}", path.display(), source)
            }
            PersistenceError::NotFound(id) => write!(f, "Session not found: {id}"),
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistenceError::Io { source, .. } => Some(source),
            PersistenceError::Serialize { source, .. } => Some(source),
            PersistenceError::NotFound(_) => None,
        }
    }
}

/// Save/load contract consumed by the chat loop.
pub trait SessionStore: Send + Sync {
    fn save(&self, session: &Session) -> Result<(), PersistenceError>;
    fn load(&self, id: &str) -> Result<Session, PersistenceError>;
    /// Most recently updated session, if any exist.
    fn latest(&self) -> Result<Option<Session>, PersistenceError>;
    /// Every stored session, newest first.
    fn list(&self) -> Result<Vec<SessionSummary>, PersistenceError>;
}

#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `sessions/` under the platform data directory.
    pub fn default_dir() -> Option<PathBuf> {
        ProjectDirs::from("org", "parley", "parley").map(|dirs| dirs.data_dir().join("sessions"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Every readable session document. One corrupt file should not hide
    /// the others.
    fn read_all(&self) -> Result<Vec<Session>, PersistenceError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(PersistenceError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut sessions = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match Self::read(&path) {
                Ok(session) => sessions.push(session),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Skipping unreadable session file")
                }
            }
        }
        Ok(sessions)
    }

    fn read(path: &Path) -> Result<Session, PersistenceError> {
        let contents = fs::read_to_string(path).map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| PersistenceError::Serialize {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, session: &Session) -> Result<(), PersistenceError> {
        let path = self.path_for(&session.id);
        let io_err = |source| PersistenceError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let contents =
            serde_json::to_vec_pretty(session).map_err(|source| PersistenceError::Serialize {
                path: path.clone(),
                source,
            })?;

        let mut temp_file = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        temp_file.write_all(&contents).map_err(io_err)?;
        temp_file.as_file_mut().sync_all().map_err(io_err)?;
        temp_file
            .persist(&path)
            .map_err(|err| io_err(err.error))?;
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Session, PersistenceError> {
        let path = self.path_for(id);
        if !is_valid_session_id(id) || !path.exists() {
            return Err(PersistenceError::NotFound(id.to_string()));
        }
        Self::read(&path)
    }

    fn latest(&self) -> Result<Option<Session>, PersistenceError> {
        Ok(self
            .read_all()?
            .into_iter()
            .max_by_key(|session| session.updated_at))
    }

    fn list(&self) -> Result<Vec<SessionSummary>, PersistenceError> {
        let mut summaries: Vec<SessionSummary> =
            self.read_all()?.iter().map(SessionSummary::from).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}

/// Ids become file names, so only the characters [`Session::new`] produces
/// are accepted.
fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
