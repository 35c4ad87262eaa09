//! Error types and result definitions for loader operations.
//!
//! [`EtlError`] carries a classification ([`ErrorKind`]), a static description, optional
//! dynamic detail, the originating error, the call site and a captured backtrace.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type used across the crate.
pub type EtlResult<T> = Result<T, EtlError>;

#[derive(Debug, Clone)]
pub struct EtlError {
    payload: Box<ErrorPayload>,
}

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Classification of failures, grouped by the scope they affect.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Run scoped
    DestinationConnectionFailed,
    AuthenticationError,
    ConfigError,

    // Table scoped
    SchemaMismatch,
    MissingSource,
    DestinationQueryFailed,
    DestinationIoError,
    InvalidState,

    // File scoped
    ArchiveFormat,
    SourceIoError,

    // Batch scoped
    BatchRejected,
    ValidationError,
    ConversionError,

    // Row scoped
    InvalidData,
    MissingMandatoryField,

    // Enrichment
    MissingReference,

    IoError,
    SerializationError,
    EncryptionError,
    WorkerPanic,
    Unknown,
}

impl ErrorKind {
    /// Whether a failed transfer of this kind only invalidates the batch that caused it.
    ///
    /// Data and constraint problems are recorded as rejected rows and loading continues.
    /// Anything else means the destination itself is unusable for the table.
    pub fn is_batch_scoped(&self) -> bool {
        matches!(
            self,
            ErrorKind::BatchRejected
                | ErrorKind::ValidationError
                | ErrorKind::ConversionError
                | ErrorKind::InvalidData
        )
    }
}

impl EtlError {
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    pub fn description(&self) -> &str {
        &self.payload.description
    }

    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        Some(self.payload.backtrace.as_ref())
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    /// Attaches the originating error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    /// One line rendering without location or backtrace, for summaries and logs.
    pub fn summary(&self) -> String {
        let payload = &self.payload;
        match &payload.detail {
            Some(detail) => format!("[{:?}] {}: {detail}", payload.kind, payload.description),
            None => format!("[{:?}] {}", payload.kind, payload.description),
        }
    }

    #[track_caller]
    fn new(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        EtlError {
            payload: Box::new(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }

    #[track_caller]
    fn wrap<E>(kind: ErrorKind, description: &'static str, err: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        let detail = err.to_string();
        EtlError::new(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Errors compare equal when their kinds match, which is what tests assert on.
impl PartialEq for EtlError {
    fn eq(&self, other: &EtlError) -> bool {
        self.payload.kind == other.payload.kind
    }
}

impl fmt::Display for EtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload = &self.payload;
        let location = payload.location;
        write!(
            f,
            "[{:?}] {} @ {}:{}",
            payload.kind,
            payload.description,
            location.file(),
            location.line()
        )?;

        if let Some(detail) = &payload.detail {
            write_indented(f, "Detail:", detail)?;
        }

        let backtrace = payload.backtrace.to_string();
        if !backtrace.trim().is_empty() && !backtrace.contains("disabled backtrace") {
            write_indented(f, "Backtrace:", &backtrace)?;
        }

        Ok(())
    }
}

fn write_indented(f: &mut fmt::Formatter<'_>, heading: &str, body: &str) -> fmt::Result {
    write!(f, "\n  {heading}")?;
    for line in body.lines() {
        if line.trim().is_empty() {
            write!(f, "\n    ")?;
        } else {
            write!(f, "\n    {line}")?;
        }
    }

    Ok(())
}

impl error::Error for EtlError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

impl From<(ErrorKind, &'static str)> for EtlError {
    #[track_caller]
    fn from((kind, description): (ErrorKind, &'static str)) -> EtlError {
        EtlError::new(kind, Cow::Borrowed(description), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for EtlError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, description, detail): (ErrorKind, &'static str, D)) -> EtlError {
        EtlError::new(kind, Cow::Borrowed(description), Some(detail.into()), None)
    }
}

impl From<std::io::Error> for EtlError {
    #[track_caller]
    fn from(err: std::io::Error) -> EtlError {
        EtlError::wrap(ErrorKind::IoError, "I/O operation failed", err)
    }
}

impl From<serde_json::Error> for EtlError {
    #[track_caller]
    fn from(err: serde_json::Error) -> EtlError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => {
                (ErrorKind::SerializationError, "JSON serialization failed")
            }
        };

        EtlError::wrap(kind, description, err)
    }
}

impl From<csv::Error> for EtlError {
    #[track_caller]
    fn from(err: csv::Error) -> EtlError {
        let (kind, description) = match err.kind() {
            csv::ErrorKind::Io(_) => (ErrorKind::SourceIoError, "Reading delimited source failed"),
            _ => (ErrorKind::InvalidData, "Malformed delimited record"),
        };

        EtlError::wrap(kind, description, err)
    }
}

impl From<zip::result::ZipError> for EtlError {
    #[track_caller]
    fn from(err: zip::result::ZipError) -> EtlError {
        let (kind, description) = match err {
            zip::result::ZipError::Io(_) => (ErrorKind::SourceIoError, "Reading archive failed"),
            _ => (ErrorKind::ArchiveFormat, "Invalid source archive"),
        };

        EtlError::wrap(kind, description, err)
    }
}

impl From<rustls::Error> for EtlError {
    #[track_caller]
    fn from(err: rustls::Error) -> EtlError {
        EtlError::wrap(ErrorKind::EncryptionError, "TLS configuration failed", err)
    }
}

/// Maps driver errors by SQLSTATE. Errors without a code come from the connection itself.
impl From<tokio_postgres::Error> for EtlError {
    #[track_caller]
    fn from(err: tokio_postgres::Error) -> EtlError {
        let Some(code) = err.code() else {
            let description = if err.is_closed() {
                "PostgreSQL connection closed"
            } else {
                "PostgreSQL connection failed"
            };
            return EtlError::wrap(ErrorKind::DestinationConnectionFailed, description, err);
        };

        let (kind, description) = classify_sql_state(code);
        EtlError::wrap(kind, description, err)
    }
}

/// Classifies a SQLSTATE, by class where the whole class shares one scope.
///
/// Class `22` (data exception) and class `23` (integrity constraint violation) only
/// reject the batch being copied.
fn classify_sql_state(code: &tokio_postgres::error::SqlState) -> (ErrorKind, &'static str) {
    use tokio_postgres::error::SqlState;

    match *code {
        SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
        | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION
        | SqlState::TOO_MANY_CONNECTIONS
        | SqlState::ADMIN_SHUTDOWN
        | SqlState::CRASH_SHUTDOWN
        | SqlState::CANNOT_CONNECT_NOW => {
            return (
                ErrorKind::DestinationConnectionFailed,
                "PostgreSQL connection failed",
            );
        }
        SqlState::INVALID_PASSWORD => {
            return (
                ErrorKind::AuthenticationError,
                "PostgreSQL authentication failed",
            );
        }
        SqlState::DISK_FULL | SqlState::IO_ERROR => {
            return (ErrorKind::DestinationIoError, "PostgreSQL I/O error");
        }
        SqlState::BAD_COPY_FILE_FORMAT => {
            return (
                ErrorKind::ConversionError,
                "PostgreSQL rejected the copied data",
            );
        }
        _ => {}
    }

    match code.code().get(..2) {
        Some("08") => (
            ErrorKind::DestinationConnectionFailed,
            "PostgreSQL connection failed",
        ),
        Some("28") => (
            ErrorKind::AuthenticationError,
            "PostgreSQL authentication failed",
        ),
        Some("22") => (
            ErrorKind::ConversionError,
            "PostgreSQL rejected the copied data",
        ),
        Some("23") => (
            ErrorKind::ValidationError,
            "PostgreSQL constraint violation",
        ),
        _ => (ErrorKind::DestinationQueryFailed, "PostgreSQL query failed"),
    }
}
