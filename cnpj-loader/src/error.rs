use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

use cnpj_etl::error::EtlError;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

pub type LoaderResult<T> = Result<T, LoaderError>;

/// Captured backtrace wrapper, rendered only on request.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that stop the whole run.
///
/// Failures of single tables are not errors here, they are reported in the run summary.
#[derive(Debug)]
pub enum LoaderError {
    Etl(EtlError),
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    Io(std::io::Error, CapturedBacktrace),
    /// The operator pressed Ctrl-C.
    Interrupted,
}

impl LoaderError {
    pub fn category(&self) -> &'static str {
        match self {
            LoaderError::Etl(_) => "loader error",
            LoaderError::Config(_, _) => "configuration error",
            LoaderError::Io(_, _) => "i/o error",
            LoaderError::Interrupted => "interrupted",
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            LoaderError::Etl(err) => err.backtrace(),
            LoaderError::Config(_, backtrace) | LoaderError::Io(_, backtrace) => Some(&backtrace.0),
            LoaderError::Interrupted => None,
        }
    }

    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        LoaderError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Multi-line report for the terminal, causes included.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("cnpj-loader failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        let mut source = Error::source(self);
        let mut index = 1usize;
        while let Some(err) = source {
            out.push_str(&format!("cause {index}: {err}\n"));
            source = err.source();
            index += 1;
        }

        if should_render_backtrace() {
            if let Some(backtrace) = self.backtrace() {
                out.push_str("backtrace:\n");
                out.push_str(&backtrace.to_string());
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
        }

        out
    }
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderError::Etl(err) => write!(f, "{}", err.summary()),
            LoaderError::Config(source, _) => write!(f, "configuration error: {source}"),
            LoaderError::Io(source, _) => write!(f, "i/o error: {source}"),
            LoaderError::Interrupted => f.write_str("run interrupted by the operator"),
        }
    }
}

impl Error for LoaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoaderError::Etl(err) => err.source(),
            LoaderError::Config(source, _) => Some(source.as_ref()),
            LoaderError::Io(source, _) => Some(source),
            LoaderError::Interrupted => None,
        }
    }
}

impl From<std::io::Error> for LoaderError {
    fn from(err: std::io::Error) -> Self {
        LoaderError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<EtlError> for LoaderError {
    fn from(err: EtlError) -> Self {
        LoaderError::Etl(err)
    }
}
