//! Sign-in, sign-out and the post-login redirect.
//!
//! A successful customer login kicks off guest cart migration and waits for it
//! only up to the configured bound; past that the login completes and the
//! migration keeps running in the background. Migration never fails a login.

use std::time::Duration;

use bento_core::User;
use secrecy::SecretString;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::api::{ApiError, ApiGateway};
use crate::migration::{CartMigrationService, MigrationError, MigrationReport};
use crate::session::SessionError;

/// Where customers land after login.
pub const CUSTOMER_HOME: &str = "/menus";
/// Where store staff land after login.
pub const STAFF_HOME: &str = "/store/dashboard";
/// Where staff are sent after logout.
pub const STAFF_LOGIN: &str = "/staff/login";
/// Where an expired session sends the user.
pub const LOGIN: &str = "/login";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Api(ApiError),

    #[error("failed to store session: {0}")]
    Session(#[from] SessionError),
}

impl From<ApiError> for AuthError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::AuthExpired => Self::InvalidCredentials,
            ApiError::Forbidden(message) => Self::Forbidden(message),
            other => Self::Api(other),
        }
    }
}

impl AuthError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// What happened to the guest cart during login.
#[derive(Debug)]
pub enum MigrationStatus {
    /// Not a customer login.
    Skipped,
    Completed(MigrationReport),
    /// Migration failed; the login still went through.
    Failed(String),
    /// Still running when the wait bound passed.
    Pending(JoinHandle<Result<MigrationReport, MigrationError>>),
}

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub user: User,
    /// Navigation target.
    pub redirect: String,
    pub migration: MigrationStatus,
}

/// Pick the post-login target.
///
/// A same-site `requested` path wins; otherwise the role decides.
#[must_use]
pub fn post_login_target(user: &User, requested: Option<&str>) -> String {
    if let Some(path) = requested.filter(|p| is_local_path(p)) {
        return path.to_string();
    }
    if user.is_customer() {
        CUSTOMER_HOME.to_string()
    } else if user.is_store_staff() {
        STAFF_HOME.to_string()
    } else {
        "/".to_string()
    }
}

fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//")
}

/// Login, logout and session refresh.
#[derive(Debug, Clone)]
pub struct AuthService {
    api: ApiGateway,
    migration: CartMigrationService,
    migration_timeout: Duration,
}

impl AuthService {
    #[must_use]
    pub const fn new(api: ApiGateway, migration: CartMigrationService, migration_timeout: Duration) -> Self {
        Self {
            api,
            migration,
            migration_timeout,
        }
    }

    /// Sign in, migrate the guest cart for customers, and pick a redirect.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for a rejected login, or an API
    /// or storage error. Migration problems are reported in the outcome.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
        redirect: Option<&str>,
    ) -> Result<LoginOutcome, AuthError> {
        let response = self.api.login(username, password).await?;
        self.api.session().sign_in(&response.token, &response.user)?;
        info!(user_id = %response.user.id, role = ?response.user.role, "Signed in");

        let migration = if response.user.is_customer() {
            self.migrate_bounded().await
        } else {
            MigrationStatus::Skipped
        };

        Ok(LoginOutcome {
            redirect: post_login_target(&response.user, redirect),
            user: response.user,
            migration,
        })
    }

    async fn migrate_bounded(&self) -> MigrationStatus {
        let service = self.migration.clone();
        let mut handle = tokio::spawn(async move { service.migrate().await });

        match tokio::time::timeout(self.migration_timeout, &mut handle).await {
            Ok(Ok(Ok(report))) => MigrationStatus::Completed(report),
            Ok(Ok(Err(e))) => {
                warn!(error = %e, "Cart migration failed, continuing login");
                MigrationStatus::Failed(e.to_string())
            }
            Ok(Err(join)) => {
                warn!(error = %join, "Cart migration task ended abnormally");
                MigrationStatus::Failed(join.to_string())
            }
            Err(_) => {
                info!(
                    timeout_ms = self.migration_timeout.as_millis(),
                    "Cart migration still running, not waiting"
                );
                MigrationStatus::Pending(handle)
            }
        }
    }

    /// Clear the session and return where to go next.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Session` if the session cannot be cleared.
    #[instrument(skip(self))]
    pub fn logout(&self) -> Result<&'static str, AuthError> {
        let session = self.api.session();
        let was_staff = session.current_user().is_some_and(|u| u.is_store_staff());
        session.clear(None)?;
        info!("Signed out");
        Ok(if was_staff { STAFF_LOGIN } else { "/" })
    }

    /// Fetch the current user and refresh the cached copy.
    ///
    /// # Errors
    ///
    /// Returns an API error; an expired token also clears the session.
    #[instrument(skip(self))]
    pub async fn me(&self) -> Result<User, AuthError> {
        let user = self.api.me().await?;
        self.api.session().set_current_user(&user)?;
        Ok(user)
    }

    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.api.session().current_user()
    }
}
