use anyhow::{Result, anyhow};
use oauth2::TokenResponse;
use oauth2::basic::BasicClient;
use oauth2::reqwest::http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, PkceCodeChallenge, RedirectUrl,
    RefreshToken, Scope, TokenUrl,
};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tiny_http::{Response, Server};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Google,
    Slack,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Slack => "slack",
        }
    }

    fn auth_url(&self) -> &'static str {
        match self {
            Provider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            Provider::Slack => "https://slack.com/oauth/v2/authorize",
        }
    }

    fn token_url(&self) -> &'static str {
        match self {
            Provider::Google => "https://oauth2.googleapis.com/token",
            Provider::Slack => "https://slack.com/api/oauth.v2.access",
        }
    }

    /// Slack wants its scopes comma-joined in a single parameter.
    pub fn scope(&self) -> &'static str {
        match self {
            Provider::Google => "https://mail.google.com/",
            Provider::Slack => "channels:history,channels:read,im:history,im:read,users:read",
        }
    }

    fn uses_pkce(&self) -> bool {
        matches!(self, Provider::Google)
    }

    /// Lifetime assumed when the token response carries no `expires_in`.
    /// `None` means the token does not expire.
    pub fn default_token_lifetime_secs(&self) -> Option<i64> {
        match self {
            Provider::Google => Some(3500),
            Provider::Slack => None,
        }
    }

    pub fn client_secret_env(&self) -> &'static str {
        match self {
            Provider::Google => "GOOGLE_CLIENT_SECRET",
            Provider::Slack => "SLACK_CLIENT_SECRET",
        }
    }

    fn client(&self, client_id: &str, client_secret: Option<&str>) -> Result<BasicClient> {
        let client_id = ClientId::new(client_id.to_string());
        let client_secret = client_secret.map(|s| ClientSecret::new(s.to_string()));
        let auth_url = AuthUrl::new(self.auth_url().to_string())?;
        let token_url = TokenUrl::new(self.token_url().to_string())?;
        Ok(BasicClient::new(client_id, client_secret, auth_url, Some(token_url)))
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "google" | "gmail" => Ok(Provider::Google),
            "slack" => Ok(Provider::Slack),
            other => Err(anyhow!("unknown provider '{other}' (expected google or slack)")),
        }
    }
}

/// Tokens returned by the oauth flow (in-memory)
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

fn into_tokens<T: TokenResponse<oauth2::basic::BasicTokenType>>(token: &T) -> Tokens {
    Tokens {
        access_token: token.access_token().secret().to_string(),
        refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
        expires_in: token.expires_in().map(|d| d.as_secs()),
    }
}

/// Exchange a refresh token for a new access token
pub fn refresh_access_token(
    provider: Provider,
    client_id: &str,
    client_secret: Option<&str>,
    refresh_token: &str,
) -> Result<Tokens> {
    let oauth_client = provider.client(client_id, client_secret)?;

    let rt = RefreshToken::new(refresh_token.to_string());
    let token = oauth_client
        .exchange_refresh_token(&rt)
        .request(http_client)
        .map_err(|e| anyhow!("{provider} token refresh failed: {e}"))?;

    Ok(into_tokens(&token))
}

/// Resolve the loopback address the redirect listener must bind to.
pub fn callback_bind_addr(redirect_uri: &str) -> Result<SocketAddr> {
    let redirect = Url::parse(redirect_uri)
        .map_err(|e| anyhow!("Invalid redirect_uri '{redirect_uri}': {e}"))?;

    let host = redirect
        .host_str()
        .ok_or_else(|| anyhow!("redirect_uri missing host: {redirect_uri}"))?;

    let port = redirect
        .port_or_known_default()
        .ok_or_else(|| anyhow!("redirect_uri missing/unknown port: {redirect_uri}"))?;

    let bind_ip: IpAddr = match host {
        "localhost" | "127.0.0.1" => IpAddr::V4(Ipv4Addr::LOCALHOST),
        other => other.parse::<IpAddr>().map_err(|_| {
            anyhow!("redirect_uri host must be localhost/127.0.0.1 or an IP: {other}")
        })?,
    };

    Ok(SocketAddr::new(bind_ip, port))
}

/// Pull `code` out of a callback request target like "/callback?code=...&state=...".
pub fn code_from_callback(request_target: &str) -> Option<String> {
    let parsed = Url::parse("http://127.0.0.1").ok()?.join(request_target).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
}

/// Perform the authorization-code flow (with PKCE where the provider supports it).
/// Opens the system browser and captures the code via a tiny loopback server.
pub fn perform_interactive_flow(
    provider: Provider,
    client_id: &str,
    client_secret: Option<&str>,
    redirect_uri: &str,
) -> Result<Tokens> {
    let bind_addr = callback_bind_addr(redirect_uri)?;

    // Listen before opening the browser so the redirect cannot race us
    let server = Server::http(bind_addr)
        .map_err(|e| anyhow!("Failed to bind OAuth callback server on {bind_addr}: {e:?}"))?;

    let oauth_client = provider
        .client(client_id, client_secret)?
        .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string())?);

    let mut request = oauth_client
        .authorize_url(oauth2::CsrfToken::new_random)
        .add_scope(Scope::new(provider.scope().to_string()));

    let pkce_verifier = if provider.uses_pkce() {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        request = request.set_pkce_challenge(pkce_challenge);
        Some(pkce_verifier)
    } else {
        None
    };

    let (auth_url, _csrf_token) = request.url();

    println!("Open this URL in your browser to connect {provider}:\n{auth_url}");
    if let Err(e) = open::that(auth_url.as_str()) {
        log::warn!("could not open browser automatically: {e}");
    }

    let mut code_opt: Option<String> = None;
    let wait_until = Instant::now() + Duration::from_secs(120);

    while Instant::now() < wait_until {
        let Ok(maybe_request) = server.recv_timeout(Duration::from_millis(500)) else {
            continue;
        };

        let Some(request) = maybe_request else {
            continue;
        };

        match code_from_callback(request.url()) {
            Some(code) => {
                code_opt = Some(code);
                let _ = request.respond(Response::from_string(
                    "Authorization received. You can close this tab.",
                ));
                break;
            }
            None => {
                let _ = request.respond(Response::from_string(
                    "No code found in redirect. You can close this tab.",
                ));
            }
        }
    }

    let code = code_opt.ok_or_else(|| anyhow!("No code received within timeout"))?;

    let mut exchange = oauth_client.exchange_code(AuthorizationCode::new(code));
    if let Some(verifier) = pkce_verifier {
        exchange = exchange.set_pkce_verifier(verifier);
    }

    let token = exchange.request(http_client).map_err(|err| {
        log::error!("{provider} token exchange failed: {err:#?}");
        anyhow!("{provider} token exchange failed: {err}")
    })?;

    Ok(into_tokens(&token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_round_trips_through_str() {
        assert_eq!("google".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!("Gmail".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!("SLACK".parse::<Provider>().unwrap(), Provider::Slack);
        assert!("teams".parse::<Provider>().is_err());
        assert_eq!(Provider::Slack.to_string(), "slack");
    }

    #[test]
    fn only_google_tokens_expire_by_default() {
        assert_eq!(Provider::Google.default_token_lifetime_secs(), Some(3500));
        assert_eq!(Provider::Slack.default_token_lifetime_secs(), None);
    }

    #[test]
    fn bind_addr_uses_loopback_for_localhost() {
        let addr = callback_bind_addr("http://localhost:8080/callback").unwrap();
        assert_eq!(addr, "127.0.0.1:8080".parse().unwrap());
    }

    #[test]
    fn bind_addr_rejects_hostnames() {
        assert!(callback_bind_addr("http://example.com:8080/callback").is_err());
        assert!(callback_bind_addr("not a url").is_err());
    }

    #[test]
    fn extracts_code_from_callback_target() {
        assert_eq!(
            code_from_callback("/callback?state=xyz&code=4%2F0Ab"),
            Some("4/0Ab".to_string())
        );
        assert_eq!(code_from_callback("/callback?error=access_denied"), None);
    }
}
