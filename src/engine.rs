//! The rendering-engine contract the exporter drives.
//!
//! An [`Engine`] launches [`Session`]s; a session loads one document, answers
//! script evaluations against it, prints it to PDF and is finally closed.

use crate::options::{Margins, PageFormat};
use crate::template::HeaderFooterTemplate;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Failure inside a rendering session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Document did not reach network idle within {0:?}")]
    TimedOut(Duration),

    #[error("Cancelled")]
    Cancelled,

    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}

pub trait Engine {
    type Session: Session;

    /// Starts a fresh, exclusively owned session.
    fn launch(&self) -> Result<Self::Session, SessionError>;
}

pub trait Session {
    /// Navigates to `url` and returns once the document is quiescent.
    fn load(&mut self, url: &Url, policy: &LoadPolicy, cancel: &CancelToken)
        -> Result<(), SessionError>;

    /// Evaluates a script expression against the loaded document.
    fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value, SessionError>;

    fn print_to_pdf(&mut self, layout: &PdfLayout) -> Result<Vec<u8>, SessionError>;

    /// Tears the session down. Must be safe to call more than once.
    fn close(&mut self);
}

/// Upper bound on navigating to a document and waiting for it to go idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPolicy {
    pub timeout: Duration,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        LoadPolicy {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Everything the engine needs to paginate the loaded document.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfLayout {
    pub format: PageFormat,
    pub margins: Margins,
    pub print_background: bool,
    pub header_footer: Option<HeaderFooterTemplate>,
}

/// Shared flag a caller flips to abandon an in-flight export.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Closes the wrapped session when dropped, whichever way the export ends.
pub(crate) struct ScopedSession<S: Session> {
    inner: S,
}

impl<S: Session> ScopedSession<S> {
    pub(crate) fn new(inner: S) -> Self {
        ScopedSession { inner }
    }
}

impl<S: Session> Deref for ScopedSession<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.inner
    }
}

impl<S: Session> DerefMut for ScopedSession<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

impl<S: Session> Drop for ScopedSession<S> {
    fn drop(&mut self) {
        debug!("Releasing rendering session");
        self.inner.close();
    }
}
