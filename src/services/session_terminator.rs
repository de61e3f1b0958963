use crate::adapters::cookies::CookieStore;
use crate::domain::session::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait SessionTerminator: Send + Sync + std::fmt::Debug {
    /// Ends the local session, typically by destroying the session cookies.
    ///
    /// # Errors
    /// Returns an error if the session state could not be cleared.
    async fn sign_out(&self) -> Result<()>;
}

/// Default terminator: destroys both session cookies.
#[derive(Debug, Clone)]
pub struct CookieSignOut {
    cookies: Arc<dyn CookieStore>,
}

impl CookieSignOut {
    pub fn new(cookies: Arc<dyn CookieStore>) -> Self {
        Self { cookies }
    }
}

#[async_trait]
impl SessionTerminator for CookieSignOut {
    #[tracing::instrument(err, skip(self))]
    async fn sign_out(&self) -> Result<()> {
        self.cookies.remove_cookie(ACCESS_TOKEN_COOKIE).await?;
        self.cookies.remove_cookie(REFRESH_TOKEN_COOKIE).await?;
        tracing::info!("Session cookies destroyed");
        Ok(())
    }
}

/// Where the client runs, fixed when the client is built.
///
/// In a browser the client can end the session itself, after which the
/// original failure is returned. During server-side rendering it cannot, so
/// unrecoverable auth failures surface as [`ClientError::AuthToken`] for the
/// caller to turn into a login redirect.
#[derive(Debug, Clone)]
pub enum ExecutionContext {
    Browser(Arc<dyn SessionTerminator>),
    Server,
}

impl ExecutionContext {
    pub fn browser(terminator: Arc<dyn SessionTerminator>) -> Self {
        Self::Browser(terminator)
    }

    pub const fn is_browser(&self) -> bool {
        matches!(self, Self::Browser(_))
    }

    /// Resolves a 401 that a refresh cannot fix into the error handed to the caller.
    ///
    /// A browser ends the session and hands back the original `error`; a server
    /// replaces it with [`ClientError::AuthToken`].
    pub(crate) async fn unrecoverable(&self, error: ClientError) -> ClientError {
        match self {
            Self::Browser(terminator) => {
                terminate(terminator.as_ref()).await;
                error
            }
            Self::Server => ClientError::AuthToken,
        }
    }

    /// Reacts to a failed refresh. Returns true if the session was terminated.
    pub(crate) async fn refresh_failed(&self) -> bool {
        match self {
            Self::Browser(terminator) => {
                terminate(terminator.as_ref()).await;
                true
            }
            Self::Server => false,
        }
    }
}

async fn terminate(terminator: &dyn SessionTerminator) {
    if let Err(e) = terminator.sign_out().await {
        tracing::error!(error = %e, "Failed to terminate session");
    }
}
