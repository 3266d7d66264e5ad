use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

pub type ConsumerResult<T> = Result<T, ConsumerError>;

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

/// Error returned by the consumer binary.
///
/// Configuration faults are reported before any record is read. Failures while running carry
/// the context chain built up by the consumer.
#[derive(Debug)]
pub enum ConsumerError {
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    Io(std::io::Error, CapturedBacktrace),
    Run(anyhow::Error),
}

impl ConsumerError {
    pub fn category(&self) -> &'static str {
        match self {
            ConsumerError::Config(_, _) => "configuration error",
            ConsumerError::Io(_, _) => "i/o error",
            ConsumerError::Run(_) => "consumer error",
        }
    }

    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        ConsumerError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            ConsumerError::Config(_, cb) | ConsumerError::Io(_, cb) => Some(&cb.0),
            ConsumerError::Run(err) => Some(err.backtrace()),
        }
    }

    /// Renders the error, its causes and, with `RUST_BACKTRACE` set, a backtrace.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("consumer failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        let mut source = Error::source(self);
        let mut idx = 1usize;
        while let Some(err) = source {
            out.push_str(&format!("cause {idx}: {err}\n"));
            source = err.source();
            idx += 1;
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

impl fmt::Display for ConsumerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumerError::Config(source, _) => write!(f, "configuration error: {source}"),
            ConsumerError::Io(source, _) => write!(f, "i/o error: {source}"),
            ConsumerError::Run(source) => write!(f, "{source}"),
        }
    }
}

impl Error for ConsumerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConsumerError::Config(source, _) => Some(source.as_ref()),
            ConsumerError::Io(source, _) => Some(source),
            ConsumerError::Run(source) => source.source(),
        }
    }
}

impl From<std::io::Error> for ConsumerError {
    fn from(err: std::io::Error) -> Self {
        ConsumerError::Io(err, CapturedBacktrace::capture())
    }
}
