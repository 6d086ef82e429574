use log::{info, warn};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::oauth::{Authorizer, GMAIL_SCOPE, Tokens};
use crate::auth::tokens_file::{self, StoredCredential};
use crate::error::AuthError;

/// Used when the token endpoint omits `expires_in`.
const DEFAULT_LIFETIME_SECS: i64 = 3500;

/// Authorized, read-only state handed to the mailbox adapter.
#[derive(Clone)]
pub struct Session {
    access_token: String,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

pub struct TokenManager<A> {
    authorizer: A,
    token_path: PathBuf,
    scope: String,
}

impl<A: Authorizer> TokenManager<A> {
    pub fn new(authorizer: A, token_path: impl Into<PathBuf>) -> Self {
        Self {
            authorizer,
            token_path: token_path.into(),
            scope: GMAIL_SCOPE.to_string(),
        }
    }

    /// Returns a session; refreshes or runs the interactive flow if needed.
    pub fn authenticate(&self) -> Result<Session, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AuthError::Store(format!("system clock before epoch: {e}")))?
            .as_secs() as i64;
        self.authenticate_at(now)
    }

    pub fn authenticate_at(&self, now: i64) -> Result<Session, AuthError> {
        let cached = match tokens_file::load_credential(&self.token_path) {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    "ignoring unreadable credential file {}: {e}",
                    self.token_path.display()
                );
                None
            }
        };

        // 1) cached & not expired
        if let Some(cred) = &cached
            && cred.is_valid(&self.scope, now)
        {
            info!("using cached access token");
            return Ok(Session::new(cred.access_token.clone()));
        }

        // 2) refresh if possible
        let previous_refresh = cached
            .as_ref()
            .filter(|c| c.can_refresh() && c.scope.as_deref() == Some(self.scope.as_str()))
            .and_then(|c| c.refresh_token.clone());

        let tokens = match &previous_refresh {
            Some(rt) => {
                info!("cached token expired; refreshing");
                match self.authorizer.refresh(rt) {
                    Ok(t) => t,
                    Err(e) => {
                        warn!("refresh failed: {e}; falling back to interactive authorization");
                        self.authorizer.authorize_interactive()?
                    }
                }
            }
            // 3) otherwise interactive
            None => {
                info!("no usable credential; starting interactive authorization");
                self.authorizer.authorize_interactive()?
            }
        };

        let cred = self.to_credential(tokens, previous_refresh, now);
        tokens_file::save_credential(&self.token_path, &cred).map_err(|e| {
            AuthError::Store(format!("writing {}: {e}", self.token_path.display()))
        })?;
        Ok(Session::new(cred.access_token))
    }

    fn to_credential(
        &self,
        tokens: Tokens,
        previous_refresh: Option<String>,
        now: i64,
    ) -> StoredCredential {
        let lifetime = tokens
            .expires_in
            .map(|s| s as i64)
            .unwrap_or(DEFAULT_LIFETIME_SECS);
        StoredCredential {
            access_token: tokens.access_token,
            // Google omits the refresh token on refresh grants
            refresh_token: tokens.refresh_token.or(previous_refresh),
            expires_at_epoch: Some(now + lifetime),
            scope: Some(self.scope.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::path::Path;

    const NOW: i64 = 1_700_000_000;

    #[derive(Default)]
    struct FakeAuthorizer {
        refresh_calls: Cell<u32>,
        interactive_calls: Cell<u32>,
        refresh_fails: bool,
        interactive_fails: bool,
    }

    impl Authorizer for FakeAuthorizer {
        fn refresh(&self, refresh_token: &str) -> Result<Tokens, AuthError> {
            self.refresh_calls.set(self.refresh_calls.get() + 1);
            if self.refresh_fails {
                return Err(AuthError::TokenRequest("invalid_grant".into()));
            }
            Ok(Tokens {
                access_token: format!("refreshed-with-{refresh_token}"),
                refresh_token: None,
                expires_in: Some(3600),
            })
        }

        fn authorize_interactive(&self) -> Result<Tokens, AuthError> {
            self.interactive_calls.set(self.interactive_calls.get() + 1);
            if self.interactive_fails {
                return Err(AuthError::Flow("user closed the browser".into()));
            }
            Ok(Tokens {
                access_token: "interactive".into(),
                refresh_token: Some("new-refresh".into()),
                expires_in: Some(3599),
            })
        }
    }

    fn write_cred(path: &Path, expires_at: i64, refresh: Option<&str>) {
        tokens_file::save_credential(
            path,
            &StoredCredential {
                access_token: "cached".into(),
                refresh_token: refresh.map(str::to_string),
                expires_at_epoch: Some(expires_at),
                scope: Some(GMAIL_SCOPE.into()),
            },
        )
        .unwrap();
    }

    #[test]
    fn valid_credential_skips_authorization_server() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        write_cred(&path, NOW + 600, Some("rt"));

        let mgr = TokenManager::new(FakeAuthorizer::default(), &path);
        let session = mgr.authenticate_at(NOW).unwrap();

        assert_eq!(session.access_token(), "cached");
        assert_eq!(mgr.authorizer.refresh_calls.get(), 0);
        assert_eq!(mgr.authorizer.interactive_calls.get(), 0);
    }

    #[test]
    fn expired_credential_is_refreshed_and_keeps_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        write_cred(&path, NOW - 10, Some("rt"));

        let mgr = TokenManager::new(FakeAuthorizer::default(), &path);
        let session = mgr.authenticate_at(NOW).unwrap();

        assert_eq!(session.access_token(), "refreshed-with-rt");
        assert_eq!(mgr.authorizer.refresh_calls.get(), 1);
        assert_eq!(mgr.authorizer.interactive_calls.get(), 0);

        let saved = tokens_file::load_credential(&path).unwrap().unwrap();
        assert_eq!(saved.access_token, "refreshed-with-rt");
        assert_eq!(saved.refresh_token.as_deref(), Some("rt"));
        assert_eq!(saved.expires_at_epoch, Some(NOW + 3600));
    }

    #[test]
    fn failed_refresh_falls_back_to_interactive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        write_cred(&path, NOW - 10, Some("rt"));

        let auth = FakeAuthorizer {
            refresh_fails: true,
            ..FakeAuthorizer::default()
        };
        let mgr = TokenManager::new(auth, &path);
        let session = mgr.authenticate_at(NOW).unwrap();

        assert_eq!(session.access_token(), "interactive");
        assert_eq!(mgr.authorizer.refresh_calls.get(), 1);
        assert_eq!(mgr.authorizer.interactive_calls.get(), 1);
        let saved = tokens_file::load_credential(&path).unwrap().unwrap();
        assert_eq!(saved.refresh_token.as_deref(), Some("new-refresh"));
    }

    #[test]
    fn missing_file_runs_interactive_flow_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");

        let mgr = TokenManager::new(FakeAuthorizer::default(), &path);
        mgr.authenticate_at(NOW).unwrap();

        assert_eq!(mgr.authorizer.interactive_calls.get(), 1);
        let saved = tokens_file::load_credential(&path).unwrap().unwrap();
        assert_eq!(saved.access_token, "interactive");
        assert_eq!(saved.scope.as_deref(), Some(GMAIL_SCOPE));
    }

    #[test]
    fn expired_without_refresh_token_goes_interactive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        write_cred(&path, NOW - 10, None);

        let mgr = TokenManager::new(FakeAuthorizer::default(), &path);
        mgr.authenticate_at(NOW).unwrap();
        assert_eq!(mgr.authorizer.refresh_calls.get(), 0);
        assert_eq!(mgr.authorizer.interactive_calls.get(), 1);
    }

    #[test]
    fn interactive_failure_is_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let auth = FakeAuthorizer {
            interactive_fails: true,
            ..FakeAuthorizer::default()
        };
        let mgr = TokenManager::new(auth, &path);
        assert!(matches!(mgr.authenticate_at(NOW), Err(AuthError::Flow(_))));
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_file_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{").unwrap();

        let mgr = TokenManager::new(FakeAuthorizer::default(), &path);
        let session = mgr.authenticate_at(NOW).unwrap();
        assert_eq!(session.access_token(), "interactive");
    }
}
