//! Error taxonomy and pending-exception state
//!
//! Nothing crosses the native boundary as an unwind. Host exceptions are
//! stored in the pending slot and surfaced to native callers as sentinel
//! return values; only fatal internal inconsistencies abort the process.

use parking_lot::Mutex;
use crate::logging::error;

/// Host exception kinds visible to native extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PyErrorKind {
    Type,
    Value,
    Index,
    Key,
    Attribute,
    Overflow,
    ZeroDivision,
    UnicodeDecode,
    StopIteration,
    NotImplemented,
    Memory,
    Recursion,
    System,
    Runtime,
}

impl PyErrorKind {
    /// Exception class name as a native extension would see it.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Type => "TypeError",
            Self::Value => "ValueError",
            Self::Index => "IndexError",
            Self::Key => "KeyError",
            Self::Attribute => "AttributeError",
            Self::Overflow => "OverflowError",
            Self::ZeroDivision => "ZeroDivisionError",
            Self::UnicodeDecode => "UnicodeDecodeError",
            Self::StopIteration => "StopIteration",
            Self::NotImplemented => "NotImplementedError",
            Self::Memory => "MemoryError",
            Self::Recursion => "RecursionError",
            Self::System => "SystemError",
            Self::Runtime => "RuntimeError",
        }
    }
}

/// A host exception in flight between a builtin implementation and the
/// adapter's translation point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyException {
    pub kind: PyErrorKind,
    pub message: String,
}

impl PyException {
    pub fn new(kind: PyErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(PyErrorKind::Type, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(PyErrorKind::Value, message)
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::new(PyErrorKind::Index, message)
    }

    pub fn key_error(message: impl Into<String>) -> Self {
        Self::new(PyErrorKind::Key, message)
    }

    pub fn attribute_error(message: impl Into<String>) -> Self {
        Self::new(PyErrorKind::Attribute, message)
    }

    pub fn overflow(message: impl Into<String>) -> Self {
        Self::new(PyErrorKind::Overflow, message)
    }

    pub fn decode_error(message: impl Into<String>) -> Self {
        Self::new(PyErrorKind::UnicodeDecode, message)
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        Self::new(PyErrorKind::ZeroDivision, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(PyErrorKind::NotImplemented, message)
    }

    pub fn memory(message: impl Into<String>) -> Self {
        Self::new(PyErrorKind::Memory, message)
    }

    pub fn recursion(message: impl Into<String>) -> Self {
        Self::new(PyErrorKind::Recursion, message)
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::new(PyErrorKind::System, message)
    }
}

impl core::fmt::Display for PyException {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.kind.name(), self.message)
    }
}

impl std::error::Error for PyException {}

/// Result type used by every internal layer up to the adapter.
pub type PyResult<T> = Result<T, PyException>;

/// Global "an exception is currently pending" state.
///
/// Mutated only under the global execution lock during normal dispatch;
/// the mutex exists so diagnostic reads stay safe from other threads.
#[derive(Default)]
pub struct PendingSlot {
    slot: Mutex<Option<PyException>>,
}

impl PendingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pending exception, replacing any previous one.
    pub fn set(&self, exc: PyException) {
        *self.slot.lock() = Some(exc);
    }

    /// True if the native caller should observe an error sentinel.
    #[inline]
    pub fn occurred(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Fetch and clear the pending exception.
    pub fn take(&self) -> Option<PyException> {
        self.slot.lock().take()
    }

    /// Clear without fetching.
    pub fn clear(&self) {
        *self.slot.lock() = None;
    }

    /// Peek at the pending kind (diagnostics).
    pub fn kind(&self) -> Option<PyErrorKind> {
        self.slot.lock().as_ref().map(|e| e.kind)
    }
}

/// Unrecoverable internal error: a broken table, descriptor, or field
/// registry means the build itself is wrong. Log, dump to stderr, abort.
#[cold]
#[inline(never)]
pub fn fatal(message: &str) -> ! {
    error!(event = "fatal", error = message, "Fatal internal error");
    eprintln!("capi-bridge fatal: {message}");
    std::process::abort();
}

/// Best-effort diagnostic when no execution context is available (for
/// example a native teardown routine running after host shutdown). The
/// process continues in a degraded state.
#[cold]
pub fn report_uncaught(message: &str) {
    error!(event = "uncaught", error = message, "No execution context for error");
    eprintln!("capi-bridge: {message}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_slot_set_take() {
        let slot = PendingSlot::new();
        assert!(!slot.occurred());

        slot.set(PyException::type_error("bad operand"));
        assert!(slot.occurred());
        assert_eq!(slot.kind(), Some(PyErrorKind::Type));

        let exc = slot.take().unwrap();
        assert_eq!(exc.kind, PyErrorKind::Type);
        assert!(!slot.occurred());
    }

    #[test]
    fn test_pending_slot_replace() {
        let slot = PendingSlot::new();
        slot.set(PyException::key_error("'a'"));
        slot.set(PyException::overflow("int too big"));
        assert_eq!(slot.kind(), Some(PyErrorKind::Overflow));
    }

    #[test]
    fn test_display() {
        let exc = PyException::overflow("value out of range for C int");
        assert_eq!(exc.to_string(), "OverflowError: value out of range for C int");
    }
}
