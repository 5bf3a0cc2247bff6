//! Tools for writing an RGZ archive's contents to disk.
//!
//! Archive entry names come from who-knows-where,
//! so every one of them is resolved against the destination root
//! and rejected if it would land anywhere else.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use camino::{Utf8Component, Utf8PathBuf};
use log::*;

use crate::read::{Decoder, Directive};
use crate::result::*;

/// Creates directories and files beneath a destination root.
#[derive(Debug)]
pub struct Extractor {
    /// Absolute and canonical
    root: PathBuf,
}

impl Extractor {
    /// Makes an extractor for the given destination, creating it if needed.
    pub fn new<P: AsRef<Path>>(root: P) -> RgzResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(fs_error(root))?;
        let root = fs::canonicalize(root).map_err(fs_error(root))?;
        debug!("Extracting to {}", root.display());
        Ok(Self { root })
    }

    /// The canonicalized destination root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true if something (of any type) already exists at the given archive path.
    pub fn directory_exists(&self, name: &str) -> RgzResult<bool> {
        let path = self.adopt_path(name)?;
        path.try_exists().map_err(fs_error(&path))
    }

    /// Creates the given directory and any missing parents.
    /// Does nothing if it already exists.
    pub fn create_directory(&self, name: &str) -> RgzResult<()> {
        let path = self.adopt_path(name)?;
        fs::create_dir_all(&path).map_err(fs_error(&path))
    }

    /// Creates (or truncates) the given file and writes each chunk to it
    /// as it arrives, creating parent directories as needed.
    ///
    /// Returns the number of bytes written.
    pub fn create_file<I>(&self, name: &str, chunks: I) -> RgzResult<u64>
    where
        I: IntoIterator<Item = RgzResult<Vec<u8>>>,
    {
        let path = self.adopt_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(fs_error(parent))?;
        }
        let mut file = File::create(&path).map_err(fs_error(&path))?;
        let mut written = 0;
        for chunk in chunks {
            let chunk = chunk?;
            file.write_all(&chunk).map_err(fs_error(&path))?;
            written += chunk.len() as u64;
        }
        Ok(written)
    }

    /// Maps an archive path to a place on disk,
    /// making sure that place is inside the destination root.
    fn adopt_path(&self, name: &str) -> RgzResult<PathBuf> {
        if name.is_empty() {
            return Err(RgzError::InvalidName {
                name: String::new(),
                reason: "empty name",
            });
        }
        let traversal = || RgzError::PathTraversal {
            path: name.to_owned(),
            root: self.root.clone(),
        };

        // Archives are built on Windows; use whatever separator the host likes.
        let relative = Utf8PathBuf::from(name.replace('\\', "/"));

        let mut joined = self.root.clone();
        for component in relative.components() {
            match component {
                Utf8Component::Prefix(_) | Utf8Component::RootDir => {
                    warn!("Absolute path {} found in archive", relative);
                    return Err(traversal());
                }
                Utf8Component::CurDir => {}
                Utf8Component::ParentDir => {
                    joined.pop();
                }
                Utf8Component::Normal(part) => joined.push(part),
            }
        }

        let resolved = canonicalize_existing(&joined)
            .map_err(fs_error(&joined))?
            .ok_or_else(traversal)?;
        // Path::starts_with() compares whole components,
        // so /dest-evil doesn't pass for /dest.
        if !resolved.starts_with(&self.root) {
            return Err(traversal());
        }
        trace!("{} -> {}", name, resolved.display());
        Ok(resolved)
    }
}

/// Canonicalizes the longest existing prefix of `path`
/// (resolving any symlinks along it), then appends the rest.
///
/// Returns `None` if `path` runs through a dangling symlink,
/// since there's no telling where writing through it would land.
fn canonicalize_existing(path: &Path) -> io::Result<Option<PathBuf>> {
    let mut existing = path;
    let mut missing: Vec<&OsStr> = Vec::new();
    loop {
        match fs::canonicalize(existing) {
            Ok(mut canonical) => {
                canonical.extend(missing.iter().rev());
                return Ok(Some(canonical));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if fs::symlink_metadata(existing).is_ok() {
                    return Ok(None);
                }
                match (existing.parent(), existing.file_name()) {
                    (Some(parent), Some(name)) => {
                        missing.push(name);
                        existing = parent;
                    }
                    _ => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }
    }
}

fn fs_error(path: &Path) -> impl FnOnce(io::Error) -> RgzError + '_ {
    move |source| RgzError::Filesystem {
        path: path.to_owned(),
        source,
    }
}

/// Tallies from a call to [`extract_all()`]
///
/// [`extract_all()`]: fn.extract_all.html
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ExtractStats {
    pub directories_created: usize,
    /// Directory records for things that were already on disk
    pub directories_existing: usize,
    pub files: usize,
    pub bytes: u64,
}

/// Pulls every directive out of the decoder and carries it out,
/// stopping at the archive's end record or the first error.
pub fn extract_all<R: io::Read>(
    decoder: &mut Decoder<R>,
    extractor: &Extractor,
) -> RgzResult<ExtractStats> {
    let mut stats = ExtractStats::default();
    loop {
        match decoder.next_directive()? {
            Directive::Directory { path } => {
                if extractor.directory_exists(&path)? {
                    debug!("Dir already exists: {}", path);
                    stats.directories_existing += 1;
                } else {
                    info!("Create dir: {}", path);
                    extractor.create_directory(&path)?;
                    stats.directories_created += 1;
                }
            }
            Directive::File { path, content, .. } => {
                info!("Create file: {}", path);
                stats.bytes += extractor.create_file(&path, content)?;
                stats.files += 1;
            }
            Directive::End => break,
        }
    }
    info!(
        "Done: {} directories, {} files ({} bytes)",
        stats.directories_created, stats.files, stats.bytes
    );
    Ok(stats)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spec::encode;

    fn chunks(pieces: &[&[u8]]) -> Vec<RgzResult<Vec<u8>>> {
        pieces.iter().map(|p| Ok(p.to_vec())).collect()
    }

    /// Lists everything under `root`, relative to it, sorted.
    fn listing(root: &Path) -> Vec<String> {
        fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                let relative = path.strip_prefix(root).unwrap();
                out.push(relative.to_string_lossy().replace('\\', "/"));
                if path.is_dir() {
                    walk(root, &path, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(root, root, &mut out);
        out.sort();
        out
    }

    #[test]
    fn creates_missing_root() {
        let tempdir = tempfile::tempdir().unwrap();
        let dest = tempdir.path().join("some").join("dest");
        let extractor = Extractor::new(&dest).unwrap();
        assert!(dest.is_dir());
        assert_eq!(extractor.root(), fs::canonicalize(&dest).unwrap());
    }

    #[test]
    fn directory_creation_is_idempotent() {
        let tempdir = tempfile::tempdir().unwrap();
        let extractor = Extractor::new(tempdir.path()).unwrap();

        assert!(!extractor.directory_exists("a\\b").unwrap());
        extractor.create_directory("a\\b").unwrap();
        assert!(extractor.directory_exists("a\\b").unwrap());
        extractor.create_directory("a\\b").unwrap();
        assert!(extractor.directory_exists("a/b").unwrap());
        assert_eq!(listing(extractor.root()), vec!["a", "a/b"]);
    }

    #[test]
    fn files_are_written_in_chunks() {
        let tempdir = tempfile::tempdir().unwrap();
        let extractor = Extractor::new(tempdir.path()).unwrap();

        let written = extractor
            .create_file("x\\y\\z.txt", chunks(&[b"hello, ", b"", b"world"]))
            .unwrap();
        assert_eq!(written, 12);
        let path = extractor.root().join("x").join("y").join("z.txt");
        assert_eq!(fs::read(&path).unwrap(), b"hello, world");

        // Files are overwritten, not appended to.
        extractor.create_file("x/y/z.txt", chunks(&[b"bye"])).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"bye");
    }

    #[test]
    fn chunk_errors_stop_the_write() {
        let tempdir = tempfile::tempdir().unwrap();
        let extractor = Extractor::new(tempdir.path()).unwrap();

        let pieces = vec![
            Ok(b"first".to_vec()),
            Err(RgzError::TruncatedStream {
                field: "file content",
                offset: 42,
            }),
            Ok(b"never".to_vec()),
        ];
        assert!(matches!(
            extractor.create_file("f", pieces),
            Err(RgzError::TruncatedStream { offset: 42, .. })
        ));
        assert_eq!(fs::read(extractor.root().join("f")).unwrap(), b"first");
    }

    #[test]
    fn traversal_is_forbidden() {
        let tempdir = tempfile::tempdir().unwrap();
        let dest = tempdir.path().join("dest");
        let extractor = Extractor::new(&dest).unwrap();

        for name in [
            "../../etc/passwd",
            "..\\..\\etc\\passwd",
            "..",
            "a/../../outside",
            "/etc/passwd",
            "\\etc\\passwd",
            // A sibling sharing the root's name as a prefix
            "../dest-evil/file",
        ] {
            match extractor.create_file(name, chunks(&[b"pwned"])) {
                Err(RgzError::PathTraversal { path, .. }) => assert_eq!(path, name),
                other => panic!("{} should be forbidden, got {:?}", name, other),
            }
            assert!(matches!(
                extractor.create_directory(name),
                Err(RgzError::PathTraversal { .. })
            ));
            assert!(matches!(
                extractor.directory_exists(name),
                Err(RgzError::PathTraversal { .. })
            ));
        }
        assert!(listing(extractor.root()).is_empty());
        assert_eq!(listing(tempdir.path()), vec!["dest"]);
    }

    #[test]
    fn dot_dot_inside_the_root_is_fine() {
        let tempdir = tempfile::tempdir().unwrap();
        let extractor = Extractor::new(tempdir.path()).unwrap();

        extractor.create_file("a/../b/./c", chunks(&[b"ok"])).unwrap();
        assert_eq!(listing(extractor.root()), vec!["b", "b/c"]);
    }

    #[test]
    fn empty_names_are_rejected() {
        let tempdir = tempfile::tempdir().unwrap();
        let extractor = Extractor::new(tempdir.path()).unwrap();
        assert!(matches!(
            extractor.create_directory(""),
            Err(RgzError::InvalidName { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_out_of_the_root_are_forbidden() {
        use std::os::unix::fs::symlink;

        let tempdir = tempfile::tempdir().unwrap();
        let outside = tempdir.path().join("outside");
        fs::create_dir(&outside).unwrap();
        let extractor = Extractor::new(tempdir.path().join("dest")).unwrap();
        symlink(&outside, extractor.root().join("link")).unwrap();
        symlink(
            tempdir.path().join("nowhere"),
            extractor.root().join("dangling"),
        )
        .unwrap();

        assert!(matches!(
            extractor.create_file("link/evil", chunks(&[b"pwned"])),
            Err(RgzError::PathTraversal { .. })
        ));
        assert!(matches!(
            extractor.create_file("dangling", chunks(&[b"pwned"])),
            Err(RgzError::PathTraversal { .. })
        ));
        assert_eq!(fs::read_dir(&outside).unwrap().count(), 0);
        assert!(!tempdir.path().join("nowhere").exists());
    }

    #[test]
    fn extract_everything() {
        let mut archive = Vec::new();
        encode::directory(&mut archive, "data");
        encode::directory(&mut archive, "data");
        encode::file(&mut archive, "data\\sprite\\poring.spr", b"\x53\x50\x01\x02");
        encode::file(&mut archive, "readme.txt", b"hi");
        encode::end(&mut archive);

        let tempdir = tempfile::tempdir().unwrap();
        let extractor = Extractor::new(tempdir.path()).unwrap();
        let mut decoder = Decoder::new(archive.as_slice());
        let stats = extract_all(&mut decoder, &extractor).unwrap();

        assert_eq!(
            stats,
            ExtractStats {
                directories_created: 1,
                directories_existing: 1,
                files: 2,
                bytes: 6,
            }
        );
        assert_eq!(
            listing(extractor.root()),
            vec![
                "data",
                "data/sprite",
                "data/sprite/poring.spr",
                "readme.txt"
            ]
        );
    }

    #[test]
    fn traversal_aborts_extraction() {
        let mut archive = Vec::new();
        encode::file(&mut archive, "..\\escaped", b"pwned");
        encode::file(&mut archive, "fine", b"never gets here");
        encode::end(&mut archive);

        let tempdir = tempfile::tempdir().unwrap();
        let extractor = Extractor::new(tempdir.path().join("dest")).unwrap();
        let mut decoder = Decoder::new(archive.as_slice());
        assert!(matches!(
            extract_all(&mut decoder, &extractor),
            Err(RgzError::PathTraversal { .. })
        ));
        assert_eq!(listing(tempdir.path()), vec!["dest"]);
    }
}
