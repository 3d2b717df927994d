//! Unified error types for Tiller

use std::time::Duration;
use thiserror::Error;

use crate::bridge::TransportError;
use crate::session::Session;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Tiller
#[derive(Error, Debug)]
pub enum Error {
    /// A failed interactive operation, bound to the session it ran against
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Download capture failure, distinct from session failures so callers
    /// can detect partial success (e.g. an orphaned sibling tab)
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The shared browser process could not be launched or terminated
    #[error("browser process failure: {0}")]
    Process(#[source] TransportError),

    /// A caller-supplied value could not be encoded for the page
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Create a process-lifecycle error
    pub fn process(source: TransportError) -> Self {
        Error::Process(source)
    }

    /// Create an invalid-argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// The session a failed interactive operation was bound to, if any
    pub fn session(&self) -> Option<&Session> {
        match self {
            Error::Session(err) => Some(err.session()),
            Error::Download(DownloadError::Trigger(err)) => Some(err.session()),
            _ => None,
        }
    }

    /// Whether the transport reported an aborted in-page navigation
    pub fn is_navigation_aborted(&self) -> bool {
        matches!(self, Error::Session(err) if err.is_navigation_aborted())
    }
}

/// Session-bound error raised for any failed interactive operation.
///
/// Carries the owning [`Session`], which is still open: a caller can resume
/// a diagnostic loop against the exact session that failed, for example via
/// [`Session::await_commands`]. No automatic retry is performed.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct SessionError {
    message: String,
    session: Session,
    #[source]
    source: Option<TransportError>,
}

impl SessionError {
    /// Create a session-bound error
    pub(crate) fn new(
        session: Session,
        message: impl Into<String>,
        source: Option<TransportError>,
    ) -> Self {
        SessionError {
            message: message.into(),
            session,
            source,
        }
    }

    /// The session the failed operation ran against
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Human-readable description of the failed operation
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The underlying transport failure, when one caused this error
    pub fn transport(&self) -> Option<&TransportError> {
        self.source.as_ref()
    }

    /// Whether the underlying failure was an aborted in-page navigation
    pub fn is_navigation_aborted(&self) -> bool {
        self.source
            .as_ref()
            .is_some_and(TransportError::is_navigation_aborted)
    }
}

/// Download capture failures
#[derive(Error, Debug)]
pub enum DownloadError {
    /// More than one new file appeared in the capture directory; no safe
    /// automatic resolution exists, so this is fatal and never retried
    #[error("ambiguous download: {count} new files appeared: {names:?}")]
    Ambiguous { count: usize, names: Vec<String> },

    /// The in-page fetch or its data-URI conversion failed
    #[error("download fetch failed: {0}")]
    Fetch(String),

    /// The fetched payload was not a decodable base64 data URI
    #[error("download decode failed: {0}")]
    Decode(String),

    /// No file appeared within the caller-supplied wait
    #[error("no download appeared within {waited:?}")]
    NoFile { waited: Duration },

    /// Filesystem failure while capturing the download
    #[error("download I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The triggering action itself failed
    #[error("download trigger failed: {0}")]
    Trigger(#[source] Box<SessionError>),
}

impl DownloadError {
    /// Create an ambiguity error from the offending file names
    pub fn ambiguous(names: Vec<String>) -> Self {
        DownloadError::Ambiguous {
            count: names.len(),
            names,
        }
    }

    /// Create a fetch error
    pub fn fetch<S: Into<String>>(msg: S) -> Self {
        DownloadError::Fetch(msg.into())
    }

    /// Create a decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        DownloadError::Decode(msg.into())
    }
}
