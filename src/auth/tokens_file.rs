use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Seconds before expiry at which a cached access token is treated as stale.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Authorization state persisted between runs (token.json).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at_epoch: Option<i64>, // epoch seconds
    pub scope: Option<String>,
}

impl StoredCredential {
    /// Usable as-is for `scope` at time `now` (no network needed).
    pub fn is_valid(&self, scope: &str, now: i64) -> bool {
        if self.access_token.is_empty() || self.scope.as_deref() != Some(scope) {
            return false;
        }
        matches!(self.expires_at_epoch, Some(exp) if now + EXPIRY_SKEW_SECS < exp)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Load the credential file if present
pub fn load_credential(path: &Path) -> Result<Option<StoredCredential>> {
    if !path.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(path)?;
    let cred: StoredCredential = serde_json::from_str(&s)?;
    Ok(Some(cred))
}

pub fn save_credential(path: &Path, cred: &StoredCredential) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let s = serde_json::to_string_pretty(cred)?;
    fs::write(path, s)?;
    restrict_permissions(path)?;
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
