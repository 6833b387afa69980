use std::path::PathBuf;

/// Recoverable failures surfaced by state restoration.
///
/// Invariant violations are not represented here: a malformed object graph at
/// a point where the capture guarantees well-formedness indicates corrupt
/// capture or analysis output, and restoration terminates the process with a
/// diagnostic instead of continuing with a silently corrupt replay stream.
#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to copy side file {path:?} into the subcapture output directory: {source}")]
    SideFileCopy {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("pointer array dump truncated at offset {offset}")]
    TruncatedPointerDump { offset: usize },

    #[error(
        "pointer array dump entry for build key {build_key} declares {count} addresses, but only {remaining} bytes remain"
    )]
    PointerDumpCountOutOfBounds {
        build_key: u64,
        count: u32,
        remaining: usize,
    },
}
