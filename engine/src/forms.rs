//! Email/password login and signup forms.
//!
//! Failures stay on the form as an inline message; nothing here reaches the
//! error boundary.

use connect_api::{AccountsApi, AccountsError};
use connect_core::CredentialStore;
use connect_types::AccessToken;

use crate::routes::{AUTH_JUNCTION, LOGIN_PATH, REGISTER_PATH};

pub const LOGIN_FALLBACK_ERROR: &str = "Invalid email or password";
pub const SIGNUP_FALLBACK_ERROR: &str = "Invalid";

/// Where the user ends up after a submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormOutcome {
    Stay,
    Navigate(String),
}

impl FormOutcome {
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Stay => None,
            Self::Navigate(to) => Some(to),
        }
    }
}

fn inline_message(err: &AccountsError, fallback: &str) -> String {
    err.server_message().unwrap_or_else(|| fallback.to_string())
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    error: Option<String>,
}

impl LoginForm {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            error: None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// On success the token is persisted and the user continues through the
    /// post-login junction.
    pub async fn submit(
        &mut self,
        accounts: &AccountsApi,
        credentials: &CredentialStore,
    ) -> FormOutcome {
        self.error = None;

        let response = match accounts.login(&self.email, &self.password).await {
            Ok(response) => response,
            Err(err) => {
                tracing::info!("Login rejected: {err}");
                self.error = Some(inline_message(&err, LOGIN_FALLBACK_ERROR));
                return FormOutcome::Stay;
            }
        };

        let stored = AccessToken::new(response.token)
            .map_err(anyhow::Error::new)
            .and_then(|token| credentials.set_token(token));
        if let Err(err) = stored {
            tracing::warn!("Login succeeded but the token could not be stored: {err:#}");
            self.error = Some(LOGIN_FALLBACK_ERROR.to_string());
            return FormOutcome::Stay;
        }

        tracing::info!("Logged in");
        FormOutcome::Navigate(AUTH_JUNCTION.to_string())
    }

    #[must_use]
    pub fn signup(&self) -> FormOutcome {
        FormOutcome::Navigate(REGISTER_PATH.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    error: Option<String>,
}

impl SignupForm {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            error: None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub async fn submit(&mut self, accounts: &AccountsApi) -> FormOutcome {
        self.error = None;

        match accounts
            .register(&self.name, &self.email, &self.password)
            .await
        {
            Ok(()) => {
                tracing::info!("Registered new account");
                FormOutcome::Navigate(LOGIN_PATH.to_string())
            }
            Err(err) => {
                tracing::info!("Signup rejected: {err}");
                self.error = Some(inline_message(&err, SIGNUP_FALLBACK_ERROR));
                FormOutcome::Stay
            }
        }
    }
}
