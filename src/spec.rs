//! Constants and low-level readers for the RGZ record format.
//!
//! Once the gzip wrapper is removed, an RGZ archive is a flat sequence of
//! records, each starting with a one-byte tag:
//!
//! ```text
//! directory record:
//!   tag                 1 byte   ('d')
//!   name length         1 byte   (includes an optional trailing NUL)
//!   name                (variable size)
//!
//! file record:
//!   tag                 1 byte   ('f')
//!   name length         1 byte
//!   name                (variable size)
//!   content length      4 bytes  (little-endian)
//!   content             (content length bytes)
//!
//! end record:
//!   tag                 1 byte   ('e')
//! ```
//!
//! There's no magic number, checksum, or any other framing,
//! so once we misread a single field, everything after it is garbage.

use std::io::{self, Read};

use crate::offset_reader::OffsetReader;
use crate::result::*;

/// The largest chunk of file content we hold in memory at once (1 MiB)
pub const CHUNK_MAX: usize = 1024 * 1024;

const DIRECTORY_TAG: u8 = b'd';
const FILE_TAG: u8 = b'f';
const END_TAG: u8 = b'e';

/// The kind of record that follows a tag byte
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Tag {
    Directory,
    File,
    End,
}

impl Tag {
    fn from_u8(b: u8) -> Option<Self> {
        match b {
            DIRECTORY_TAG => Some(Tag::Directory),
            FILE_TAG => Some(Tag::File),
            END_TAG => Some(Tag::End),
            _ => None,
        }
    }
}

/// Fills `buf` from the reader, calling it a truncated `field`
/// if the stream runs dry first.
pub fn read_field<R: Read>(
    reader: &mut OffsetReader<R>,
    buf: &mut [u8],
    field: &'static str,
) -> RgzResult<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => RgzError::TruncatedStream {
            field,
            offset: reader.offset(),
        },
        _ => RgzError::Io(e),
    })
}

/// Reads the tag byte that starts every record.
pub fn read_tag<R: Read>(reader: &mut OffsetReader<R>) -> RgzResult<Tag> {
    let offset = reader.offset();
    let mut tag = [0u8; 1];
    let tag = match reader.read_exact(&mut tag) {
        Ok(()) => Some(tag[0]),
        // Running out of stream where a record should start is just
        // another byte we don't understand.
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => None,
        Err(e) => return Err(RgzError::Io(e)),
    };
    tag.and_then(Tag::from_u8)
        .ok_or(RgzError::UnknownTag { tag, offset })
}

/// Reads a length-prefixed entry name.
///
/// The length byte counts a trailing NUL if the archiver wrote one;
/// at most one is stripped before the rest is checked as UTF-8.
pub fn read_name<R: Read>(reader: &mut OffsetReader<R>) -> RgzResult<String> {
    let mut length = [0u8; 1];
    read_field(reader, &mut length, "name length")?;

    let mut name = vec![0u8; length[0] as usize];
    read_field(reader, &mut name, "name")?;
    if name.last() == Some(&0) {
        name.pop();
    }

    let name = String::from_utf8(name).map_err(|e| RgzError::InvalidName {
        name: String::from_utf8_lossy(e.as_bytes()).into_owned(),
        reason: "not valid UTF-8",
    })?;
    if name.is_empty() {
        return Err(RgzError::InvalidName {
            name,
            reason: "empty name",
        });
    }
    Ok(name)
}

/// Reads a little-endian u32 content length.
pub fn read_content_length<R: Read>(reader: &mut OffsetReader<R>) -> RgzResult<u32> {
    let mut int_bytes = [0u8; std::mem::size_of::<u32>()];
    read_field(reader, &mut int_bytes, "content length")?;
    Ok(u32::from_le_bytes(int_bytes))
}
