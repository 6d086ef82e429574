use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::auth::token_store;
use crate::config::Config;
use crate::error::AuthError;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// OAuth client registration used for both the refresh grant and the interactive flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
}

/// Google's downloadable `credentials.json`; desktop apps use `installed`, web apps `web`.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecretsSection>,
    web: Option<ClientSecretsSection>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsSection {
    client_id: String,
    client_secret: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

pub fn parse_client_secrets(json: &str) -> Result<ClientCredentials, AuthError> {
    let file: ClientSecretsFile = serde_json::from_str(json)
        .map_err(|e| AuthError::Config(format!("invalid client secrets file: {e}")))?;
    let section = file.installed.or(file.web).ok_or_else(|| {
        AuthError::Config("client secrets file has neither `installed` nor `web`".into())
    })?;
    Ok(ClientCredentials {
        client_id: section.client_id,
        client_secret: section.client_secret,
        auth_url: section.auth_uri.unwrap_or_else(|| GOOGLE_AUTH_URL.into()),
        token_url: section.token_uri.unwrap_or_else(|| GOOGLE_TOKEN_URL.into()),
    })
}

pub fn load_client_secrets(path: &Path) -> Result<ClientCredentials, AuthError> {
    let s = fs::read_to_string(path)
        .map_err(|e| AuthError::Config(format!("reading {}: {e}", path.display())))?;
    parse_client_secrets(&s)
}

/// Secrets file wins; otherwise `client_id` from config with the secret from keyring/env.
pub fn resolve_client(cfg: &Config) -> Result<ClientCredentials, AuthError> {
    if let Some(p) = &cfg.client_secrets_file {
        return load_client_secrets(Path::new(p));
    }
    let client_id = cfg
        .client_id
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            AuthError::Config("set client_id or client_secrets_file in config".into())
        })?;
    let client_secret = token_store::resolve_client_secret(&client_id);
    Ok(ClientCredentials {
        client_id,
        client_secret,
        auth_url: GOOGLE_AUTH_URL.into(),
        token_url: GOOGLE_TOKEN_URL.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_installed_app_file() {
        let json = r#"{"installed":{"client_id":"123.apps.googleusercontent.com",
            "project_id":"demo","auth_uri":"https://accounts.google.com/o/oauth2/auth",
            "token_uri":"https://oauth2.googleapis.com/token","client_secret":"shh",
            "redirect_uris":["http://localhost"]}}"#;
        let c = parse_client_secrets(json).unwrap();
        assert_eq!(c.client_id, "123.apps.googleusercontent.com");
        assert_eq!(c.client_secret.as_deref(), Some("shh"));
        assert_eq!(c.auth_url, "https://accounts.google.com/o/oauth2/auth");
        assert_eq!(c.token_url, GOOGLE_TOKEN_URL);
    }

    #[test]
    fn web_section_falls_back_to_google_endpoints() {
        let c = parse_client_secrets(r#"{"web":{"client_id":"w"}}"#).unwrap();
        assert_eq!(c.client_id, "w");
        assert!(c.client_secret.is_none());
        assert_eq!(c.auth_url, GOOGLE_AUTH_URL);
    }

    #[test]
    fn rejects_file_without_client_section() {
        let err = parse_client_secrets(r#"{"other":{}}"#).unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn config_without_client_id_is_config_error() {
        let err = resolve_client(&Config::default()).unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn secrets_file_path_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, r#"{"installed":{"client_id":"from-file","client_secret":"s"}}"#)
            .unwrap();
        let cfg = Config {
            client_id: Some("from-config".into()),
            client_secrets_file: Some(path.to_string_lossy().into_owned()),
            ..Config::default()
        };
        let c = resolve_client(&cfg).unwrap();
        assert_eq!(c.client_id, "from-file");
    }
}
