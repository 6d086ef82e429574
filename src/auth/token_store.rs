use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};
use log::{debug, warn};

const SERVICE: &str = "rs_mail_classifier";
pub const CLIENT_SECRET_ENV: &str = "OAUTH_CLIENT_SECRET";

fn secret_entry(client_id: &str) -> Result<Entry> {
    Entry::new(SERVICE, client_id).map_err(|e| anyhow!("keyring unavailable: {e}"))
}

/// Store the OAuth client secret for `client_id` in the OS keyring.
pub fn save_client_secret(client_id: &str, client_secret: &str) -> Result<()> {
    secret_entry(client_id)?
        .set_password(client_secret)
        .map_err(|e| anyhow!("could not write keyring entry: {e}"))
}

pub fn load_client_secret(client_id: &str) -> Result<Option<String>> {
    match secret_entry(client_id)?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!("could not read keyring entry: {e}")),
    }
}

/// Keyring first, then `OAUTH_CLIENT_SECRET`. A broken keyring is not fatal:
/// installed-app clients may have no secret at all.
pub fn resolve_client_secret(client_id: &str) -> Option<String> {
    match load_client_secret(client_id) {
        Ok(Some(s)) => {
            debug!("using client secret from keyring");
            return Some(s);
        }
        Ok(None) => {}
        Err(e) => warn!("{e}; falling back to {CLIENT_SECRET_ENV}"),
    }
    std::env::var(CLIENT_SECRET_ENV).ok().filter(|s| !s.is_empty())
}
