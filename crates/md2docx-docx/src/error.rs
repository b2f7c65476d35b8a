//! Assembly error types.

use std::path::PathBuf;

/// Error from an [`AssemblySession`](crate::AssemblySession) operation.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    /// Destination path is empty.
    #[error("output path is empty")]
    EmptyPath,

    /// Heading level outside 1..=6.
    #[error("heading level {0} is out of range (expected 1-6)")]
    InvalidHeadingLevel(u8),

    /// Mutually exclusive paragraph style options.
    #[error("conflicting paragraph style: {0}")]
    ConflictingStyle(&'static str),

    /// Image file does not exist.
    #[error("image not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    /// Image file exists but cannot be read.
    #[error("image access denied: {}", .0.display())]
    ImageAccessDenied(PathBuf),

    /// Image data cannot be decoded far enough to know its size.
    #[error("cannot read dimensions of {name}: {message}")]
    ImageDimensions { name: String, message: String },

    /// Filesystem error while reading an image or writing the package.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Zip container could not be written.
    #[error("failed to write package: {0}")]
    Package(String),
}

impl AssemblyError {
    /// Underlying I/O error kind, if this error came from the filesystem.
    #[must_use]
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }

    /// Whether the error is about one image rather than the whole document.
    #[must_use]
    pub fn is_image_error(&self) -> bool {
        matches!(
            self,
            Self::ImageNotFound(_) | Self::ImageAccessDenied(_) | Self::ImageDimensions { .. }
        )
    }

    /// Short reason used in inline placeholders.
    #[must_use]
    pub fn short_reason(&self) -> &'static str {
        match self {
            Self::ImageNotFound(_) => "file not found",
            Self::ImageAccessDenied(_) => "access denied",
            Self::ImageDimensions { .. } => "unreadable image data",
            Self::EmptyPath
            | Self::InvalidHeadingLevel(_)
            | Self::ConflictingStyle(_)
            | Self::Io { .. }
            | Self::Package(_) => "assembly error",
        }
    }
}
