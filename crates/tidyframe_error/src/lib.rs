//! Error type shared by all tidyframe crates.
use std::error::Error;
use std::fmt;

pub type Result<T, E = FrameError> = std::result::Result<T, E>;

/// Category of a failure.
///
/// Every failure is a deterministic validation error raised at the point of
/// the offending call. Nulls are data, never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A referenced column does not exist.
    UnknownColumn,
    /// Column lengths disagree with each other or with the table.
    LengthMismatch,
    /// An operation was applied to a value or column of the wrong kind.
    TypeMismatch,
    /// A row index past the end of a column.
    IndexOutOfRange,
    /// A column selection request that can't be resolved unambiguously.
    InvalidSelector,
    /// Two columns with the same name.
    DuplicateColumnName,
    /// Checked integer arithmetic overflowed.
    NumericOverflow,
    /// A malformed argument, e.g. an invalid regex pattern.
    InvalidArgument,
    /// Internal invariant violated.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownColumn => write!(f, "UnknownColumn"),
            Self::LengthMismatch => write!(f, "LengthMismatch"),
            Self::TypeMismatch => write!(f, "TypeMismatch"),
            Self::IndexOutOfRange => write!(f, "IndexOutOfRange"),
            Self::InvalidSelector => write!(f, "InvalidSelector"),
            Self::DuplicateColumnName => write!(f, "DuplicateColumnName"),
            Self::NumericOverflow => write!(f, "NumericOverflow"),
            Self::InvalidArgument => write!(f, "InvalidArgument"),
            Self::Internal => write!(f, "Internal"),
        }
    }
}

#[derive(Debug)]
pub struct FrameError {
    inner: Box<FrameErrorInner>,
}

#[derive(Debug)]
struct FrameErrorInner {
    kind: ErrorKind,
    msg: String,
    source: Option<Box<dyn Error + Send + Sync>>,
    /// Extra context, displayed in insertion order.
    fields: Vec<(&'static str, String)>,
}

impl FrameError {
    /// Create a new error of kind `Internal`.
    pub fn new(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Internal, msg)
    }

    pub fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        FrameError {
            inner: Box::new(FrameErrorInner {
                kind,
                msg: msg.into(),
                source: None,
                fields: Vec::new(),
            }),
        }
    }

    pub fn with_source(msg: impl Into<String>, source: Box<dyn Error + Send + Sync>) -> Self {
        let mut err = Self::new(msg);
        err.inner.source = Some(source);
        err
    }

    pub fn unknown_column(name: impl fmt::Display) -> Self {
        Self::with_kind(ErrorKind::UnknownColumn, "Unknown column").with_field("column", name)
    }

    pub fn length_mismatch(expected: usize, got: usize) -> Self {
        Self::with_kind(ErrorKind::LengthMismatch, "Column length mismatch")
            .with_field("expected", expected)
            .with_field("got", got)
    }

    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::TypeMismatch, msg)
    }

    /// Attach a key/value pair that's displayed alongside the message.
    pub fn with_field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.inner.fields.push((key, value.to_string()));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn get_msg(&self) -> &str {
        &self.inner.msg
    }

    /// Get the value of a context field, if set.
    pub fn get_field(&self, key: &str) -> Option<&str> {
        self.inner
            .fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.inner.msg, self.inner.kind)?;
        for (key, value) in &self.inner.fields {
            write!(f, "\n  {key}: {value}")?;
        }
        if let Some(source) = &self.inner.source {
            write!(f, "\nError source: {source}")?;
        }
        Ok(())
    }
}

impl Error for FrameError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source.as_ref().map(|e| e.as_ref() as _)
    }
}

pub trait OptionExt<T> {
    /// Return an `Internal` error naming `what` if the value is None.
    fn required(self, what: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, what: &'static str) -> Result<T> {
        self.ok_or_else(|| FrameError::new(format!("Missing required value: {what}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_fields() {
        let err = FrameError::unknown_column("weight").with_field("table_columns", 3);
        assert_eq!(
            "Unknown column (UnknownColumn)\n  column: weight\n  table_columns: 3",
            err.to_string()
        );
    }

    #[test]
    fn get_field() {
        let err = FrameError::length_mismatch(3, 4);
        assert_eq!(ErrorKind::LengthMismatch, err.kind());
        assert_eq!(Some("3"), err.get_field("expected"));
        assert_eq!(Some("4"), err.get_field("got"));
        assert_eq!(None, err.get_field("missing"));
    }

    #[test]
    fn source_is_kept() {
        let parse_err = "abc".parse::<i64>().unwrap_err();
        let err = FrameError::with_source("failed to parse", Box::new(parse_err));
        assert_eq!(ErrorKind::Internal, err.kind());
        assert_eq!("failed to parse", err.get_msg());
        assert!(err.source().is_some());
    }

    #[test]
    fn required_none() {
        let err = None::<usize>.required("partition").unwrap_err();
        assert_eq!(ErrorKind::Internal, err.kind());
        assert_eq!(Some(1), Some(1).required("value").ok());
    }
}
