//! Production error boundary around page rendering.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use connect_core::ErrorReporter;
use connect_core::reporting::fingerprints;
use connect_types::View;

use crate::pages::RenderError;

pub const FALLBACK_MESSAGE: &str = "Something went wrong. The error has been reported.";

pub struct ErrorBoundary {
    enabled: bool,
    reporter: Arc<dyn ErrorReporter>,
}

impl std::fmt::Debug for ErrorBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorBoundary")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl ErrorBoundary {
    #[must_use]
    pub fn new(enabled: bool, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self { enabled, reporter }
    }

    fn fallback(&self, err: &anyhow::Error) -> View {
        self.reporter.capture(err, fingerprints::RENDER);
        View::Fallback {
            message: FALLBACK_MESSAGE.to_string(),
        }
    }

    /// Runs `render`. When enabled, errors and panics become
    /// [`View::Fallback`] after being reported; otherwise both pass through.
    pub fn guard<F>(&self, render: F) -> Result<View, RenderError>
    where
        F: FnOnce() -> Result<View, RenderError>,
    {
        if !self.enabled {
            return render();
        }

        match panic::catch_unwind(AssertUnwindSafe(render)) {
            Ok(Ok(view)) => Ok(view),
            Ok(Err(err)) => Ok(self.fallback(&anyhow::Error::new(err))),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                Ok(self.fallback(&anyhow::anyhow!("page panicked: {message}")))
            }
        }
    }
}
