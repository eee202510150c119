use std::io;
use thiserror::Error;

/// Errors surfaced by [`crate::registry::Registry::upload`].
#[derive(Debug, Error)]
pub enum UploadError {
    /// `PUT` targeted a filename that was never minted by `prepare_upload`,
    /// or whose entry has already been finalized and removed.
    #[error("NoPreparedUpload")]
    NoPreparedUpload,

    /// A writer is already attached to this filename.
    #[error("AlreadyUploading")]
    AlreadyUploading,

    /// The stream ended with fewer or more bytes than the declared
    /// `Content-Length`.
    #[error("declared length {declared} does not match bytes written {written}")]
    LengthMismatch { declared: u64, written: u64 },

    /// The blob store or the client stream failed.
    #[error("upload I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors surfaced while reading a tailing (in-progress) file.
#[derive(Debug, Error)]
pub enum TailingReadError {
    /// The upload this reader was following was aborted before reaching the
    /// reader's current position.
    #[error("UploadAborted")]
    Aborted,

    #[error("tailing read I/O error: {0}")]
    Io(#[from] io::Error),
}
