//! unrgz unpacks RGZ archives: gzip-wrapped streams of directory and file
//! records, as shipped in game patches.
//!
//! ```no_run
//! # use unrgz::*;
//! let mut decoder = open_archive("data.rgz")?;
//! let extractor = Extractor::new("out")?;
//! let stats = extract_all(&mut decoder, &extractor)?;
//! println!("Wrote {} files", stats.files);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Or, to do something other than write the archive to disk,
//! pull directives out of the decoder yourself:
//! ```no_run
//! # use std::io::Write;
//! # use unrgz::*;
//! let mut decoder = open_archive("data.rgz")?;
//! loop {
//!     match decoder.next_directive()? {
//!         Directive::Directory { path } => println!("{}/", path),
//!         Directive::File { path, content, .. } => {
//!             let mut out = std::io::sink();
//!             for chunk in content {
//!                 out.write_all(&chunk?)?;
//!             }
//!             println!("{}", path);
//!         }
//!         Directive::End => break,
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The format is a flat sequence of length-prefixed records with no framing
//! to resynchronize on, so the first malformed record ends the whole thing.
//! Nothing is buffered ahead; file contents stream straight from the archive
//! to disk in chunks of at most [`CHUNK_MAX`] bytes.
//!
//! Entry names are treated as hostile. Every one is resolved against the
//! destination root (symlinks included), and anything that would land
//! outside of it is refused with [`RgzError::PathTraversal`].
//!
//! [`CHUNK_MAX`]: constant.CHUNK_MAX.html
//! [`RgzError::PathTraversal`]: result/enum.RgzError.html#variant.PathTraversal

pub mod extract;
pub mod read;
pub mod result;

pub use extract::{extract_all, ExtractStats, Extractor};
pub use read::{open_archive, Decoder, Directive, FileContents};
pub use result::{RgzError, RgzResult};
pub use spec::CHUNK_MAX;

mod offset_reader;
mod spec;
