use log::{info, warn};
use oauth2::TokenResponse;
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::reqwest::http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, RefreshToken, Scope, TokenUrl,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tiny_http::{Response, Server};
use url::Url;

use crate::auth::client_secrets::ClientCredentials;
use crate::error::AuthError;

/// Full mailbox access; needed for permanent deletion.
pub const GMAIL_SCOPE: &str = "https://mail.google.com/";

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

/// Tokens returned by a grant (in-memory)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

/// The two ways of obtaining fresh tokens from the authorization server.
pub trait Authorizer {
    fn refresh(&self, refresh_token: &str) -> Result<Tokens, AuthError>;
    fn authorize_interactive(&self) -> Result<Tokens, AuthError>;
}

/// Google OAuth2 over the blocking `oauth2` client.
pub struct GoogleAuthorizer {
    client: ClientCredentials,
    redirect_uri: String,
    scope: String,
}

impl GoogleAuthorizer {
    pub fn new(client: ClientCredentials, redirect_uri: impl Into<String>) -> Self {
        Self {
            client,
            redirect_uri: redirect_uri.into(),
            scope: GMAIL_SCOPE.to_string(),
        }
    }

    fn oauth_client(&self) -> Result<BasicClient, AuthError> {
        let auth_url = AuthUrl::new(self.client.auth_url.clone())
            .map_err(|e| AuthError::Config(format!("bad auth url: {e}")))?;
        let token_url = TokenUrl::new(self.client.token_url.clone())
            .map_err(|e| AuthError::Config(format!("bad token url: {e}")))?;
        Ok(BasicClient::new(
            ClientId::new(self.client.client_id.clone()),
            self.client.client_secret.clone().map(ClientSecret::new),
            auth_url,
            Some(token_url),
        ))
    }
}

fn tokens_from(token: &BasicTokenResponse) -> Tokens {
    Tokens {
        access_token: token.access_token().secret().to_string(),
        refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
        expires_in: token.expires_in().map(|d| d.as_secs()),
    }
}

impl Authorizer for GoogleAuthorizer {
    fn refresh(&self, refresh_token: &str) -> Result<Tokens, AuthError> {
        let token = self
            .oauth_client()?
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request(http_client)
            .map_err(|e| AuthError::TokenRequest(format!("refresh grant: {e}")))?;
        Ok(tokens_from(&token))
    }

    /// Authorization Code + PKCE. Opens the system browser and captures the code on a
    /// loopback listener bound to the configured redirect uri.
    fn authorize_interactive(&self) -> Result<Tokens, AuthError> {
        let (host, port) = loopback_host_port(&self.redirect_uri)?;
        let bind_ip: IpAddr = match host.as_str() {
            "localhost" | "127.0.0.1" => IpAddr::V4(Ipv4Addr::LOCALHOST),
            other => other.parse::<IpAddr>().map_err(|_| {
                AuthError::Config(format!(
                    "redirect_uri host must be localhost/127.0.0.1 or an IP: {other}"
                ))
            })?,
        };
        let bind_addr = SocketAddr::new(bind_ip, port);

        // listen before handing the URL to the browser
        let server = Server::http(bind_addr).map_err(|e| {
            AuthError::Flow(format!("failed to bind callback server on {bind_addr}: {e}"))
        })?;

        let redirect = RedirectUrl::new(self.redirect_uri.clone())
            .map_err(|e| AuthError::Config(format!("bad redirect_uri: {e}")))?;
        let oauth_client = self.oauth_client()?.set_redirect_uri(redirect);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf_token) = oauth_client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(self.scope.clone()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        eprintln!("Open this URL in your browser:\n{auth_url}");
        if let Err(e) = open::that(auth_url.as_str()) {
            warn!("could not open browser automatically: {e}");
        }

        let code = wait_for_code(&server, &host, port, csrf_token.secret())?;

        let token = oauth_client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request(http_client)
            .map_err(|e| AuthError::TokenRequest(format!("code exchange: {e}")))?;
        info!("interactive authorization complete");
        Ok(tokens_from(&token))
    }
}

fn loopback_host_port(redirect_uri: &str) -> Result<(String, u16), AuthError> {
    let redirect = Url::parse(redirect_uri)
        .map_err(|e| AuthError::Config(format!("invalid redirect_uri '{redirect_uri}': {e}")))?;
    let host = redirect
        .host_str()
        .ok_or_else(|| AuthError::Config(format!("redirect_uri missing host: {redirect_uri}")))?
        .to_string();
    let port = redirect.port_or_known_default().ok_or_else(|| {
        AuthError::Config(format!("redirect_uri missing/unknown port: {redirect_uri}"))
    })?;
    Ok((host, port))
}

enum Callback {
    Code(String),
    StateMismatch,
    Missing,
}

/// Pull `code` out of a callback path like `/callback?code=...&state=...`.
fn parse_callback(host: &str, port: u16, path: &str, expected_state: &str) -> Callback {
    let Ok(parsed) = Url::parse(&format!("http://{host}:{port}{path}")) else {
        return Callback::Missing;
    };
    let mut code = None;
    let mut state = None;
    for (k, v) in parsed.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "state" => state = Some(v.into_owned()),
            _ => {}
        }
    }
    match code {
        Some(_) if state.as_deref() != Some(expected_state) => Callback::StateMismatch,
        Some(c) => Callback::Code(c),
        None => Callback::Missing,
    }
}

fn wait_for_code(
    server: &Server,
    host: &str,
    port: u16,
    expected_state: &str,
) -> Result<String, AuthError> {
    let wait_until = Instant::now() + CALLBACK_TIMEOUT;

    while Instant::now() < wait_until {
        let Ok(maybe_request) = server.recv_timeout(Duration::from_millis(500)) else {
            continue;
        };
        let Some(request) = maybe_request else {
            continue;
        };

        match parse_callback(host, port, request.url(), expected_state) {
            Callback::Code(code) => {
                let _ = request.respond(Response::from_string(
                    "Authorization received. You can close this tab.",
                ));
                return Ok(code);
            }
            Callback::StateMismatch => {
                let _ = request
                    .respond(Response::from_string("State mismatch.").with_status_code(400));
                return Err(AuthError::Flow("callback state did not match request".into()));
            }
            Callback::Missing => {
                let _ = request.respond(Response::from_string(
                    "No code found in redirect. You can close this tab.",
                ));
            }
        }
    }

    Err(AuthError::Flow("no authorization code received within timeout".into()))
}
