use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

use crate::error::ClientError;
use crate::wire::UserDto;

const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StoredSession {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

/// Persists the signed-in user's token and name across runs.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<StoredSession, ClientError> {
        if !self.path.exists() {
            debug!("no stored session");
            return Ok(StoredSession::default());
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| ClientError::Session(format!("failed reading {}: {e}", self.path.display())))?;
        if raw.trim().is_empty() {
            return Ok(StoredSession::default());
        }
        serde_json::from_str(&raw).map_err(|source| ClientError::Decode {
            context: self.path.display().to_string(),
            source,
        })
    }

    #[instrument(skip(self, stored), fields(path = %self.path.display()))]
    fn save(&self, stored: &StoredSession) -> Result<(), ClientError> {
        let session_err = |e: std::io::Error| {
            ClientError::Session(format!("failed writing {}: {e}", self.path.display()))
        };

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(session_err)?;

        let serialized = serde_json::to_string_pretty(stored).map_err(|source| ClientError::Decode {
            context: "session".to_string(),
            source,
        })?;

        let mut temp = NamedTempFile::new_in(dir).map_err(session_err)?;
        writeln!(temp, "{serialized}").map_err(session_err)?;
        temp.flush().map_err(session_err)?;
        temp.persist(&self.path)
            .map_err(|err| session_err(err.error))?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn clear(&self) -> Result<(), ClientError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                ClientError::Session(format!("failed removing {}: {e}", self.path.display()))
            })?;
        }
        Ok(())
    }
}

/// Auth state handed to every workflow that talks to the gateway.
#[derive(Debug, Clone)]
pub struct Session {
    store: Option<SessionStore>,
    username: Option<String>,
    token: Option<String>,
    current_user: Option<UserDto>,
}

impl Session {
    /// Load whatever was persisted by a previous `sign_in`.
    pub fn init(store: SessionStore) -> Result<Self, ClientError> {
        let stored = store.load()?;
        let token = stored.token.filter(|t| !t.trim().is_empty());
        info!(
            signed_in = token.is_some(),
            username = ?stored.username,
            "session loaded"
        );
        Ok(Self {
            store: Some(store),
            username: stored.username,
            token,
            current_user: None,
        })
    }

    /// A session that is never written to disk.
    pub fn ephemeral(username: Option<String>, token: Option<String>) -> Self {
        Self {
            store: None,
            username,
            token,
            current_user: None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Precondition for every protected gateway call.
    pub fn require_token(&self) -> Result<&str, ClientError> {
        self.token().ok_or(ClientError::MissingToken)
    }

    pub fn is_signed_in(&self) -> bool {
        self.token.is_some()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn current_user(&self) -> Option<&UserDto> {
        self.current_user.as_ref()
    }

    pub fn set_current_user(&mut self, user: UserDto) {
        self.username = Some(user.username.clone());
        self.current_user = Some(user);
    }

    #[instrument(skip(self, token))]
    pub fn sign_in(&mut self, username: &str, token: String) -> Result<(), ClientError> {
        self.username = Some(username.to_string());
        self.token = Some(token);
        self.current_user = None;
        if let Some(store) = &self.store {
            store.save(&StoredSession {
                username: self.username.clone(),
                token: self.token.clone(),
            })?;
        }
        info!(username, "signed in");
        Ok(())
    }

    /// Forget the token and everything derived from it.
    #[instrument(skip(self))]
    pub fn teardown(&mut self) -> Result<(), ClientError> {
        self.username = None;
        self.token = None;
        self.current_user = None;
        if let Some(store) = &self.store {
            store.clear()?;
        }
        info!("session cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn sign_in_persists_and_teardown_forgets() {
        let temp = tempdir().expect("tempdir");
        let store = SessionStore::new(temp.path());

        let mut session = Session::init(store.clone()).expect("init");
        assert!(!session.is_signed_in());
        assert!(matches!(session.require_token(), Err(ClientError::MissingToken)));

        session.sign_in("ada", "tok-123".to_string()).expect("sign in");
        assert!(store.path().exists());

        let reloaded = Session::init(store.clone()).expect("reload");
        assert_eq!(reloaded.require_token().expect("token"), "tok-123");
        assert_eq!(reloaded.username(), Some("ada"));

        session.teardown().expect("teardown");
        assert!(!store.path().exists());
        let after = Session::init(store).expect("reload after teardown");
        assert!(!after.is_signed_in());
        assert_eq!(after.username(), None);
    }

    #[test]
    fn blank_token_counts_as_signed_out() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join(SESSION_FILE), r#"{"username":"ada","token":"  "}"#).unwrap();
        let session = Session::init(SessionStore::new(temp.path())).expect("init");
        assert!(!session.is_signed_in());
    }
}
