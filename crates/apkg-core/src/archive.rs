//! Deterministic gzip-tar archives.
//!
//! Every entry is written with normalized metadata so the same source tree
//! produces the same archive on any machine:
//!
//! - name `./<relative/posix/path>` (directories end in `/`)
//! - uid/gid 0, owner and group `root`
//! - mode `0755` for directories and `*.sh`/`*.py`, `0644` otherwise
//! - traversal in file-name order
//! - gzip header with mtime 0 and OS byte 255
//!
//! Entry mtimes are the files' own unless a fixed epoch is supplied
//! (`SOURCE_DATE_EPOCH`).

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Component, Path};
use std::time::UNIX_EPOCH;

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use tar::{Archive, Builder, EntryType, Header};
use walkdir::WalkDir;

/// File extensions archived with the executable mode.
pub const EXECUTABLE_EXTENSIONS: [&str; 2] = ["sh", "py"];

const MODE_EXEC: u32 = 0o755;
const MODE_FILE: u32 = 0o644;
const OWNER: &str = "root";

/// Longest name that fits the ustar/GNU header name field.
const NAME_FIELD_LEN: usize = 100;

/// Errors raised while writing or reading archives.
#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },

    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(String),

    #[error("Source is not a directory: {0}")]
    NotADirectory(String),
}

/// One entry of an archive, as reported by [`list_tar_gz`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry name as stored (e.g. `./CONTROL/config.json`).
    pub path: String,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Permission bits.
    pub mode: u32,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// Write `source` as a deterministic `.tar.gz` at `dest`.
///
/// Any path whose relative components include a name in `exclude` is
/// skipped together with its whole subtree. Returns the number of entries
/// written.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked, a file cannot be read, or
/// the archive cannot be written.
pub fn create_tar_gz(
    dest: &Path,
    source: &Path,
    exclude: &[&str],
    mtime: Option<u64>,
) -> Result<usize, ArchiveError> {
    let file = File::create(dest)?;
    let count = write_tar_gz(BufWriter::new(file), source, exclude, mtime)?;
    tracing::debug!("wrote {count} entries to {}", dest.display());
    Ok(count)
}

/// Stream a deterministic gzip-tar of `source` into `writer`.
///
/// # Errors
///
/// See [`create_tar_gz`].
pub fn write_tar_gz<W: Write>(
    writer: W,
    source: &Path,
    exclude: &[&str],
    mtime: Option<u64>,
) -> Result<usize, ArchiveError> {
    if !source.is_dir() {
        return Err(ArchiveError::NotADirectory(source.display().to_string()));
    }

    let encoder = GzBuilder::new()
        .mtime(0)
        .operating_system(255)
        .write(writer, Compression::best());
    let mut tar = Builder::new(encoder);

    let walker = WalkDir::new(source)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !exclude.iter().any(|x| *x == name)
        });

    let mut count = 0;
    for entry in walker {
        let entry = entry.map_err(|source_err| ArchiveError::Walk {
            path: source.display().to_string(),
            source: source_err,
        })?;
        let path = entry.path();
        let rel = path.strip_prefix(source).unwrap_or(path);
        let name = archive_name(rel)?;

        // follow symlinks to their targets; directory links are not descended
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if entry.path_is_symlink() => {
                tracing::warn!("skipping dangling symlink {}: {e}", path.display());
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let entry_mtime = mtime.unwrap_or_else(|| file_mtime(&meta));

        if meta.is_dir() {
            if entry.path_is_symlink() {
                tracing::warn!("skipping symlink to directory {}", path.display());
                continue;
            }
            append_entry(
                &mut tar,
                &format!("{name}/"),
                EntryType::Directory,
                MODE_EXEC,
                entry_mtime,
                &[],
            )?;
        } else if meta.is_file() {
            // read fully so the declared size always matches the content
            let data = fs::read(path)?;
            append_entry(
                &mut tar,
                &name,
                EntryType::Regular,
                file_mode(rel),
                entry_mtime,
                &data,
            )?;
        } else {
            tracing::debug!("skipping special file {}", path.display());
            continue;
        }
        count += 1;
    }

    let encoder = tar.into_inner()?;
    encoder.finish()?.flush()?;
    Ok(count)
}

/// `./` followed by the forward-slash relative path.
fn archive_name(rel: &Path) -> Result<String, ArchiveError> {
    let mut parts = Vec::new();
    for component in rel.components() {
        if let Component::Normal(part) = component {
            let part = part
                .to_str()
                .ok_or_else(|| ArchiveError::NonUtf8Path(rel.display().to_string()))?;
            parts.push(part);
        }
    }
    Ok(format!("./{}", parts.join("/")))
}

fn file_mode(rel: &Path) -> u32 {
    let executable = rel
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXECUTABLE_EXTENSIONS.contains(&e));
    if executable { MODE_EXEC } else { MODE_FILE }
}

fn file_mtime(meta: &fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs())
}

/// Append one entry, keeping the literal name (including the `./` prefix).
///
/// `Header::set_path` normalizes `./` away, so the name bytes are written
/// directly; names that do not fit the header get a GNU long-name record.
fn append_entry<W: Write>(
    tar: &mut Builder<W>,
    name: &str,
    kind: EntryType,
    mode: u32,
    mtime: u64,
    data: &[u8],
) -> io::Result<()> {
    let bytes = name.as_bytes();
    if bytes.len() > NAME_FIELD_LEN {
        append_long_name(tar, bytes)?;
    }

    let mut header = Header::new_gnu();
    let len = bytes.len().min(NAME_FIELD_LEN);
    header.as_old_mut().name[..len].copy_from_slice(&bytes[..len]);
    header.set_entry_type(kind);
    header.set_mode(mode);
    header.set_uid(0);
    header.set_gid(0);
    header.set_username(OWNER)?;
    header.set_groupname(OWNER)?;
    header.set_mtime(mtime);
    header.set_size(data.len() as u64);
    header.set_cksum();

    tar.append(&header, data)
}

fn append_long_name<W: Write>(tar: &mut Builder<W>, name: &[u8]) -> io::Result<()> {
    const LONG_LINK: &[u8] = b"././@LongLink";

    let mut header = Header::new_gnu();
    header.as_old_mut().name[..LONG_LINK.len()].copy_from_slice(LONG_LINK);
    header.set_entry_type(EntryType::GNULongName);
    header.set_mode(MODE_FILE);
    header.set_uid(0);
    header.set_gid(0);
    header.set_username(OWNER)?;
    header.set_groupname(OWNER)?;
    header.set_mtime(0);
    header.set_size(name.len() as u64 + 1);
    header.set_cksum();

    tar.append(&header, name.chain(&[0u8][..]))
}

/// List the entries of a `.tar.gz`.
///
/// # Errors
///
/// Returns an error if the file is not a readable gzip-tar stream.
pub fn list_tar_gz(path: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    let mut archive = Archive::new(GzDecoder::new(File::open(path)?));
    let mut entries = Vec::new();

    for entry in archive.entries()? {
        let entry = entry?;
        let header = entry.header();
        let kind = header.entry_type();
        if !(kind.is_file() || kind.is_dir()) {
            continue;
        }
        entries.push(ArchiveEntry {
            path: String::from_utf8_lossy(&entry.path_bytes()).into_owned(),
            size: header.size()?,
            mode: header.mode()?,
            is_dir: kind.is_dir(),
        });
    }

    Ok(entries)
}

/// Contents of the first regular file in a `.tar.gz` whose final path
/// component is `file_name`.
///
/// # Errors
///
/// Returns an error if the archive is unreadable.
pub fn read_entry(path: &Path, file_name: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
    let mut archive = Archive::new(GzDecoder::new(File::open(path)?));

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let matches = entry
            .path()?
            .file_name()
            .is_some_and(|n| n == file_name);
        if matches {
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            return Ok(Some(data));
        }
    }

    Ok(None)
}

/// Unpack a `.tar.gz` into `dest`.
///
/// Entries whose names would escape `dest` are skipped by the tar reader.
///
/// # Errors
///
/// Returns an error if the archive is unreadable or a file cannot be written.
pub fn unpack_tar_gz(path: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let mut archive = Archive::new(GzDecoder::new(File::open(path)?));
    archive.set_preserve_permissions(true);
    archive.unpack(dest)?;
    Ok(())
}
