//! Errors of the batch driver.

use std::path::PathBuf;

use stereoseg_pipeline::PipelineError;

/// Everything that can stop a pair (or the whole batch) from completing.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The list file could not be read.
    #[error("failed to read list file {}: {source}", path.display())]
    ListRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The list has an odd number of entries; `line` is the last one.
    #[error("list entry on line {line} has no right-image partner")]
    UnpairedEntry { line: usize },

    /// A blank line between list entries.
    #[error("list entry on line {line} is empty")]
    EmptyEntry { line: usize },

    /// An input image could not be read from disk.
    #[error("failed to read image {}: {source}", path.display())]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Decoding, segmentation or rendering failed for the pair whose left
    /// image is `path`.
    #[error("{}: {source}", path.display())]
    Pipeline {
        path: PathBuf,
        #[source]
        source: PipelineError,
    },

    /// An artifact could not be created or written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An image artifact could not be encoded.
    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
