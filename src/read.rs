//! Tools for reading an RGZ archive.
//!
//! To start reading an archive, open it with [`open_archive()`]
//! (or wrap any decompressed stream in a [`Decoder`])
//! and pull [`Directive`]s from it until you get [`Directive::End`].
//!
//! [`open_archive()`]: fn.open_archive.html
//! [`Decoder`]: struct.Decoder.html
//! [`Directive`]: enum.Directive.html
//! [`Directive::End`]: enum.Directive.html#variant.End

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use log::*;

use crate::offset_reader::OffsetReader;
use crate::result::*;
use crate::spec::{self, Tag, CHUNK_MAX};

/// One decoded record from the archive
#[derive(Debug)]
pub enum Directive<'a, R> {
    /// Create the named directory.
    Directory { path: String },
    /// Create the named file with the given contents.
    File {
        path: String,
        content_length: u32,
        content: FileContents<'a, R>,
    },
    /// There's nothing else in the archive.
    End,
}

/// Decodes directives from a (decompressed) RGZ stream, one at a time.
///
/// Nothing is read ahead: each call to [`next_directive()`] reads one
/// record header, and file contents are only read as they're consumed.
///
/// [`next_directive()`]: struct.Decoder.html#method.next_directive
pub struct Decoder<R> {
    reader: OffsetReader<R>,
    /// Where the most recent file's content ends in the stream
    content_end: u64,
    finished: bool,
}

impl<R: io::Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: OffsetReader::new(reader),
            content_end: 0,
            finished: false,
        }
    }

    /// Returns how many (decompressed) bytes have been read so far.
    pub fn offset(&self) -> u64 {
        self.reader.offset()
    }

    /// Reads the next directive from the stream.
    ///
    /// A returned [`Directive::File`] borrows the decoder,
    /// so its content must be dropped before asking for the next directive.
    /// Any content left unread is skipped.
    /// Once `End` has been returned, it's returned forever after.
    ///
    /// [`Directive::File`]: enum.Directive.html#variant.File
    pub fn next_directive(&mut self) -> RgzResult<Directive<'_, R>> {
        if self.finished {
            return Ok(Directive::End);
        }
        self.skip_unread_content()?;

        let directive = match spec::read_tag(&mut self.reader)? {
            Tag::Directory => {
                let path = spec::read_name(&mut self.reader)?;
                trace!("Directory {}", path);
                Directive::Directory { path }
            }
            Tag::File => {
                let path = spec::read_name(&mut self.reader)?;
                let content_length = spec::read_content_length(&mut self.reader)?;
                trace!("File {} ({} bytes)", path, content_length);
                self.content_end = self.reader.offset() + content_length as u64;
                Directive::File {
                    path,
                    content_length,
                    content: FileContents {
                        reader: &mut self.reader,
                        remaining: content_length as u64,
                    },
                }
            }
            Tag::End => {
                trace!("End at offset {}", self.reader.offset());
                self.finished = true;
                Directive::End
            }
        };
        Ok(directive)
    }

    /// Moves past whatever the last file's consumer didn't read.
    fn skip_unread_content(&mut self) -> RgzResult<()> {
        let unread = self.content_end.saturating_sub(self.reader.offset());
        if unread == 0 {
            return Ok(());
        }
        debug!("Skipping {} unread content bytes", unread);
        let skipped = io::copy(&mut io::Read::take(&mut self.reader, unread), &mut io::sink())?;
        if skipped < unread {
            return Err(RgzError::TruncatedStream {
                field: "file content",
                offset: self.reader.offset(),
            });
        }
        Ok(())
    }
}

/// Opens an RGZ file, stripping its gzip wrapper.
pub fn open_archive<P: AsRef<Path>>(
    path: P,
) -> RgzResult<Decoder<MultiGzDecoder<BufReader<File>>>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| RgzError::Filesystem {
        path: path.to_owned(),
        source,
    })?;
    Ok(Decoder::new(MultiGzDecoder::new(BufReader::new(file))))
}

/// The contents of a file in the archive, read lazily in chunks of up to
/// [`CHUNK_MAX`] bytes straight from the archive stream.
///
/// Never reads past the end of its file, no matter how often it's asked.
///
/// [`CHUNK_MAX`]: ../constant.CHUNK_MAX.html
pub struct FileContents<'a, R> {
    reader: &'a mut OffsetReader<R>,
    remaining: u64,
}

impl<R> FileContents<'_, R> {
    /// Returns the number of content bytes not yet read.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<R> std::fmt::Debug for FileContents<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileContents")
            .field("offset", &self.reader.offset())
            .field("remaining", &self.remaining)
            .finish()
    }
}

impl<R: io::Read> Iterator for FileContents<'_, R> {
    type Item = RgzResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let chunk_size = self.remaining.min(CHUNK_MAX as u64) as usize;
        let mut chunk = vec![0u8; chunk_size];
        if let Err(e) = spec::read_field(self.reader, &mut chunk, "file content") {
            // The stream's unusable now; don't try again.
            self.remaining = 0;
            return Some(Err(e));
        }
        self.remaining -= chunk_size as u64;
        Some(Ok(chunk))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let chunks = self.remaining.div_ceil(CHUNK_MAX as u64) as usize;
        (chunks, Some(chunks))
    }
}
