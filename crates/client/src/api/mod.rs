//! Backend REST gateway.
//!
//! # Architecture
//!
//! - [`ApiGateway`] is the only type that talks HTTP
//! - Identity is read from [`SessionStore`] on every call, never cached here
//! - Bearer token and `guest_session_id` cookie are attached when present
//! - Error bodies are folded into [`ApiError`]; a 401 clears the stored session
//! - Response bodies are normalized into `bento_core` types before returning
//!
//! # Example
//!
//! ```rust,ignore
//! use bento_client::{ApiGateway, ClientConfig, SessionStore};
//!
//! let config = ClientConfig::from_env()?;
//! let session = SessionStore::open(config.session_file());
//! let api = ApiGateway::new(&config, session)?;
//!
//! let (orders, total) = api.store_orders(&OrderFilters::default()).await?;
//! ```

mod endpoints;
mod error;
pub mod normalize;
pub mod wire;

pub use endpoints::LoginResponse;
pub use error::{ApiError, FieldError};

use std::sync::Arc;

use reqwest::header::COOKIE;
use reqwest::{Client, Method, RequestBuilder};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::session::{SessionStore, keys};

/// Cookie carrying the anonymous guest session.
pub const GUEST_SESSION_COOKIE: &str = "guest_session_id";

/// What a 401 means for a given call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unauthorized {
    /// The stored credentials are no longer valid.
    ExpireSession,
    /// The call itself is an authentication attempt (login).
    Reject,
}

/// Gateway to the ordering backend.
#[derive(Clone)]
pub struct ApiGateway {
    inner: Arc<ApiGatewayInner>,
}

struct ApiGatewayInner {
    client: Client,
    base_url: Url,
    session: SessionStore,
}

impl std::fmt::Debug for ApiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiGateway")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// A prepared request plus what was attached to it.
struct Prepared {
    builder: RequestBuilder,
    sent_token: bool,
    sent_guest: bool,
}

impl ApiGateway {
    /// Create a gateway from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, session: SessionStore) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config.api_base_url.clone(), session))
    }

    /// Create a gateway around an existing HTTP client.
    #[must_use]
    pub fn with_client(client: Client, base_url: Url, session: SessionStore) -> Self {
        Self {
            inner: Arc::new(ApiGatewayInner {
                client,
                base_url,
                session,
            }),
        }
    }

    /// The session this gateway reads identity from.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.inner
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Network(format!("invalid request path '{path}': {e}")))
    }

    fn prepare(&self, method: Method, path: &str, query: &[(&str, String)]) -> Result<Prepared, ApiError> {
        let mut url = self.url(path)?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }

        let mut builder = self.inner.client.request(method, url);

        // Read fresh on every call; another process may have signed in or out.
        let token = self.inner.session.auth_token();
        if let Some(token) = &token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        let guest = self.inner.session.guest_session_id();
        if let Some(guest) = &guest {
            builder = builder.header(COOKIE, format!("{GUEST_SESSION_COOKIE}={guest}"));
        }

        Ok(Prepared {
            builder,
            sent_token: token.is_some(),
            sent_guest: guest.is_some(),
        })
    }

    /// Send a request and decode a JSON body.
    async fn execute<T: DeserializeOwned>(
        &self,
        prepared: Prepared,
        unauthorized: Unauthorized,
    ) -> Result<T, ApiError> {
        let response = prepared.builder.send().await.map_err(|e| {
            error!(error = %e, "Backend request failed");
            ApiError::Network(e.to_string())
        })?;

        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.bytes().await?;

        if !status.is_success() {
            let err = ApiError::from_response(status.as_u16(), &body);
            debug!(status = %status, path = %url, error = %err, "Backend returned non-success status");
            if err.is_auth_expired() && unauthorized == Unauthorized::ExpireSession {
                self.expire_session(prepared.sent_token, prepared.sent_guest);
            }
            return Err(err);
        }

        let body: &[u8] = if body.is_empty() { b"null" } else { &body };
        serde_json::from_slice(body).map_err(|e| {
            error!(
                error = %e,
                path = %url,
                body = %String::from_utf8_lossy(body).chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            ApiError::Network(format!("unexpected response body: {e}"))
        })
    }

    fn expire_session(&self, sent_token: bool, sent_guest: bool) {
        let session = &self.inner.session;
        if sent_token {
            warn!("Backend rejected the auth token, signing out");
            if let Err(e) = session.clear(None) {
                error!(error = %e, "Failed to clear expired session");
            }
        } else if sent_guest {
            warn!("Backend rejected the guest session, forgetting it");
            if let Err(e) = session.clear(Some(&[keys::GUEST_SESSION])) {
                error!(error = %e, "Failed to clear expired guest session");
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        let prepared = self.prepare(Method::GET, path, query)?;
        self.execute(prepared, Unauthorized::ExpireSession).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut prepared = self.prepare(method, path, &[])?;
        prepared.builder = prepared.builder.json(body);
        self.execute(prepared, Unauthorized::ExpireSession).await
    }

    async fn send_empty<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let prepared = self.prepare(method, path, query)?;
        self.execute(prepared, Unauthorized::ExpireSession).await
    }
}
