use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};

/// Classifies every error the runtime can surface.
///
/// The scheduler itself never produces errors, it only executes handles. All
/// values of this enum reach the user through awaiting a terminal task,
/// through a cancellation check or through [`sync_wait`](fn.sync_wait.html).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[repr(u8)]
pub enum ErrorKind {
    /// A wait exceeded its deadline.
    Timeout,
    /// A remote peer or backing service could not be reached.
    ConnectionFailed,
    /// The operation touched a task whose storage was already destroyed.
    TaskDestroyed,
    /// A bounded resource (callback slots, queues) is full.
    ResourceExhausted,
    /// Programmer misuse, e.g. completing a promise twice or consuming a
    /// task result twice.
    InvalidOperation,
    /// The task observed cooperative cancellation. Not a bug.
    Cancelled,
    /// Anything else, including panics captured from task bodies.
    Unknown,
}

impl ErrorKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "Timeout",
            ErrorKind::ConnectionFailed => "ConnectionFailed",
            ErrorKind::TaskDestroyed => "TaskDestroyed",
            ErrorKind::ResourceExhausted => "ResourceExhausted",
            ErrorKind::InvalidOperation => "InvalidOperation",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Unknown => "Unknown",
        }
    }
}

/// Error value carried in task result cells and returned by runtime calls.
///
/// Stores a [`kind`](#method.kind), a human readable message and, when
/// created through the [`runtime_error!`](macro.runtime_error.html) macro,
/// the source location of the failure.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ErrorInfo {
    kind: ErrorKind,
    message: Cow<'static, str>,
    file: &'static str,
    line: u32,
}

/// Result alias used across the whole crate.
pub type TaskResult<T> = Result<T, ErrorInfo>;

impl ErrorInfo {
    /// Create an error without source location.
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self { kind, message: message.into(), file: "", line: 0 }
    }

    /// Create an error tagged with a source location, used by
    /// [`runtime_error!`](macro.runtime_error.html).
    pub fn at(kind: ErrorKind, message: impl Into<Cow<'static, str>>,
              file: &'static str, line: u32) -> Self {
        Self { kind, message: message.into(), file, line }
    }

    /// Shorthand for the error every cancelled operation surfaces.
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation was cancelled")
    }

    pub fn kind(&self) -> ErrorKind { self.kind }
    pub fn message(&self) -> &str { &self.message }
    pub fn is_cancelled(&self) -> bool { self.kind == ErrorKind::Cancelled }

    /// Source location or `None` when the error was built without one.
    pub fn location(&self) -> Option<(&'static str, u32)> {
        if self.file.is_empty() { None } else { Some((self.file, self.line)) }
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)?;
        if let Some((file, line)) = self.location() {
            write!(f, " at {}:{}", file, line)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorInfo {}

/// Create an [`ErrorInfo`](struct.ErrorInfo.html) capturing the current
/// source file and line.
///
/// # Examples
/// ```
/// use carousel::{runtime_error, ErrorKind};
///
/// let err = runtime_error!(ErrorKind::ResourceExhausted, "queue is full");
/// assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
/// assert!(err.location().is_some());
/// ```
#[macro_export]
macro_rules! runtime_error {
    ($kind:expr, $msg:expr) => {
        $crate::ErrorInfo::at($kind, $msg, file!(), line!())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_location() {
        let err = ErrorInfo::at(ErrorKind::Timeout, "wait expired", "src/lib.rs", 10);
        assert_eq!(err.to_string(), "Timeout: wait expired at src/lib.rs:10");
    }

    #[test]
    fn test_display_without_location() {
        let err = ErrorInfo::cancelled();
        assert_eq!(err.to_string(), "Cancelled: operation was cancelled");
        assert!(err.is_cancelled());
        assert_eq!(err.location(), None);
    }

    #[test]
    fn test_macro_captures_location() {
        let err = runtime_error!(ErrorKind::InvalidOperation, "double set");
        let (file, line) = err.location().unwrap();
        assert!(file.ends_with("error.rs"));
        assert!(line > 0);
    }
}
