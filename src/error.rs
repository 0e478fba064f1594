use std::{io, path::PathBuf};
use thiserror::Error;

/// Coarse classification of a [`ZioError`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    /// Malformed input: short control buffer, bad control-description line.
    Format,
    /// A value that cannot be encoded or a control the device would reject.
    Validation,
    /// Reading or writing a device path failed.
    Io,
}

#[derive(Debug, Error)]
pub enum ZioError {
    #[error("control buffer holds {got} bytes, at least {need} are required")]
    ShortBuffer { got: usize, need: usize },

    #[error("bad control-description line {line:?}: {reason}")]
    Descriptor { line: String, reason: &'static str },

    #[error("{field} is {len} bytes long, the field holds at most {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{field} contains a NUL byte")]
    EmbeddedNul { field: &'static str },

    #[error("{field} ends with a space, which reads back as padding")]
    TrailingSpace { field: &'static str },

    #[error("control rejected: {0}")]
    Rejected(String),

    #[error("no control field named {0:?}")]
    UnknownField(String),

    #[error("{0} is read-only")]
    ReadOnly(&'static str),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ZioError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ShortBuffer { .. } | Self::Descriptor { .. } => ErrorKind::Format,
            Self::FieldTooLong { .. }
            | Self::EmbeddedNul { .. }
            | Self::TrailingSpace { .. }
            | Self::Rejected(_)
            | Self::UnknownField(_)
            | Self::ReadOnly(_) => ErrorKind::Validation,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// The underlying OS error for I/O failures, so callers can tell
    /// a missing file from a permission problem.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ZioError> = std::result::Result<T, E>;
