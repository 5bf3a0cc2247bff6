//! Error types and the related `Result<T>`

use std::path::PathBuf;

use thiserror::Error;

pub type RgzResult<T> = Result<T, RgzError>;

#[derive(Debug, Error)]
pub enum RgzError {
    /// An error from underlying I/O while reading the archive stream
    /// (including a corrupt gzip wrapper)
    #[error("I/O Error")]
    Io(#[from] std::io::Error),

    /// The byte at the start of a record isn't a known tag.
    /// `None` means the stream ended where a tag was expected.
    #[error("Unknown tag {} at offset {offset}", describe_tag(.tag))]
    UnknownTag { tag: Option<u8>, offset: u64 },

    /// The stream ended partway through a fixed-size field.
    #[error("Stream truncated at offset {offset} while reading {field}")]
    TruncatedStream { field: &'static str, offset: u64 },

    /// An entry name was empty or not valid UTF-8
    #[error("Invalid entry name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// An entry name resolved to somewhere outside the destination root
    #[error("Access outside of {} is forbidden: {path}", root.display())]
    PathTraversal { path: String, root: PathBuf },

    /// Creating or writing something in the destination failed.
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn describe_tag(tag: &Option<u8>) -> String {
    match tag {
        Some(b) if b.is_ascii_graphic() => format!("{:#04x} ('{}')", b, *b as char),
        Some(b) => format!("{:#04x}", b),
        None => String::from("<end of stream>"),
    }
}
