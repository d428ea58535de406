//! Archive Assembler and Extractor.
//!
//! Fetched files are appended one at a time so packaging can start while
//! other transfers are still running. Extraction flattens every member to its
//! base name inside a single directory.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use quickzip_core::{sanitize_file_name, unique_file_name, ArchiveError};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Rar,
}

impl ArchiveFormat {
    /// Pick a format by file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Self, ArchiveError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "zip" => Ok(Self::Zip),
            "rar" => Ok(Self::Rar),
            _ => Err(ArchiveError::UnsupportedFormat(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            )),
        }
    }
}

/// Add `file` to the zip at `archive` under its base name, creating the
/// archive on first use, then delete `file`. A member with the same name
/// already present is left alone, so replaying an append is harmless.
pub fn append(archive: &Path, file: &Path) -> Result<(), ArchiveError> {
    let entry_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ArchiveError::Io {
            path: file.display().to_string(),
            message: "path has no file name".into(),
        })?;

    if archive.exists() && contains_entry(archive, &entry_name)? {
        debug!(archive = %archive.display(), entry = %entry_name, "Entry already archived");
        return remove_source(file);
    }

    let mut writer = open_writer(archive)?;
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);
    writer
        .start_file(entry_name.as_str(), options)
        .map_err(|e| format_error(archive, e))?;

    let mut source = File::open(file).map_err(|e| ArchiveError::from_io(file, e))?;
    io::copy(&mut source, &mut writer).map_err(|e| ArchiveError::from_io(archive, e))?;
    writer.finish().map_err(|e| format_error(archive, e))?;
    drop(source);

    debug!(archive = %archive.display(), entry = %entry_name, "Appended to archive");
    remove_source(file)
}

/// [`append`] on the blocking pool.
pub async fn append_async(archive: PathBuf, file: PathBuf) -> Result<(), ArchiveError> {
    let path = archive.display().to_string();
    tokio::task::spawn_blocking(move || append(&archive, &file))
        .await
        .map_err(|e| ArchiveError::Io {
            path,
            message: format!("archive task failed: {e}"),
        })?
}

/// Names of the members stored in a zip.
pub fn entry_names(archive: &Path) -> Result<Vec<String>, ArchiveError> {
    let file = File::open(archive).map_err(|e| ArchiveError::from_io(archive, e))?;
    let zip = ZipArchive::new(file).map_err(|e| format_error(archive, e))?;
    Ok(zip.file_names().map(str::to_string).collect())
}

/// Unpack every file member of `archive` into `dest`, flattened to base names.
/// Members whose names try to escape the archive are skipped. Returns the
/// written paths in archive order.
pub fn extract_all(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let format = ArchiveFormat::from_path(archive)?;
    std::fs::create_dir_all(dest).map_err(|e| ArchiveError::from_io(dest, e))?;
    let mut taken = HashSet::new();
    match format {
        ArchiveFormat::Zip => extract_zip(archive, dest, &mut taken),
        ArchiveFormat::Rar => extract_rar(archive, dest, &mut taken),
    }
}

/// [`extract_all`] on the blocking pool.
pub async fn extract_all_async(archive: PathBuf, dest: PathBuf) -> Result<Vec<PathBuf>, ArchiveError> {
    let path = archive.display().to_string();
    tokio::task::spawn_blocking(move || extract_all(&archive, &dest))
        .await
        .map_err(|e| ArchiveError::Io {
            path,
            message: format!("extract task failed: {e}"),
        })?
}

fn extract_zip(
    archive: &Path,
    dest: &Path,
    taken: &mut HashSet<String>,
) -> Result<Vec<PathBuf>, ArchiveError> {
    let file = File::open(archive).map_err(|e| ArchiveError::from_io(archive, e))?;
    let mut zip = ZipArchive::new(file).map_err(|e| format_error(archive, e))?;
    let mut written = Vec::new();

    for index in 0..zip.len() {
        let mut member = zip.by_index(index).map_err(|e| format_error(archive, e))?;
        if member.is_dir() {
            continue;
        }
        if member.enclosed_name().is_none() {
            warn!(archive = %archive.display(), entry = member.name(), "Skipping unsafe member name");
            continue;
        }
        let Some(target) = flattened_target(dest, member.name(), taken) else {
            continue;
        };
        let mut out = File::create(&target).map_err(|e| ArchiveError::from_io(&target, e))?;
        io::copy(&mut member, &mut out).map_err(|e| ArchiveError::from_io(&target, e))?;
        out.flush().map_err(|e| ArchiveError::from_io(&target, e))?;
        written.push(target);
    }

    Ok(written)
}

fn extract_rar(
    archive: &Path,
    dest: &Path,
    taken: &mut HashSet<String>,
) -> Result<Vec<PathBuf>, ArchiveError> {
    let rar_error = |e: unrar::error::UnrarError| ArchiveError::Format {
        path: archive.display().to_string(),
        message: e.to_string(),
    };

    let mut cursor = unrar::Archive::new(archive)
        .open_for_processing()
        .map_err(rar_error)?;
    let mut written = Vec::new();

    while let Some(header) = cursor.read_header().map_err(rar_error)? {
        let entry = header.entry();
        let name = entry.filename.to_string_lossy().into_owned();
        let escapes = entry
            .filename
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));

        if !entry.is_file() || escapes {
            if escapes {
                warn!(archive = %archive.display(), entry = %name, "Skipping unsafe member name");
            }
            cursor = header.skip().map_err(rar_error)?;
            continue;
        }

        let (data, next) = header.read().map_err(rar_error)?;
        cursor = next;
        let Some(target) = flattened_target(dest, &name, taken) else {
            continue;
        };
        std::fs::write(&target, data).map_err(|e| ArchiveError::from_io(&target, e))?;
        written.push(target);
    }

    Ok(written)
}

/// A free path in `dest` for the base name of `member`. Collisions get a
/// numeric suffix before the extension.
fn flattened_target(dest: &Path, member: &str, taken: &mut HashSet<String>) -> Option<PathBuf> {
    let base = sanitize_file_name(member);
    if base.is_empty() {
        return None;
    }
    Some(dest.join(unique_file_name(&base, taken)))
}

fn contains_entry(archive: &Path, name: &str) -> Result<bool, ArchiveError> {
    Ok(entry_names(archive)?.iter().any(|n| n == name))
}

fn open_writer(archive: &Path) -> Result<ZipWriter<File>, ArchiveError> {
    if archive.exists() {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(archive)
            .map_err(|e| ArchiveError::from_io(archive, e))?;
        ZipWriter::new_append(file).map_err(|e| format_error(archive, e))
    } else {
        let file = File::create(archive).map_err(|e| ArchiveError::from_io(archive, e))?;
        Ok(ZipWriter::new(file))
    }
}

fn remove_source(file: &Path) -> Result<(), ArchiveError> {
    match std::fs::remove_file(file) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ArchiveError::from_io(file, e)),
    }
}

fn format_error(archive: &Path, e: zip::result::ZipError) -> ArchiveError {
    match e {
        zip::result::ZipError::Io(io) => ArchiveError::from_io(archive, io),
        other => ArchiveError::Format {
            path: archive.display().to_string(),
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn append_creates_then_extends_and_removes_sources() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("out.zip");
        let a = write(dir.path(), "a.txt", "alpha");
        let b = write(dir.path(), "b.txt", "beta");

        append(&archive, &a).unwrap();
        append(&archive, &b).unwrap();

        assert_eq!(entry_names(&archive).unwrap(), vec!["a.txt", "b.txt"]);
        assert!(!a.exists());
        assert!(!b.exists());

        let mut zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut body = String::new();
        zip.by_name("b.txt").unwrap().read_to_string(&mut body).unwrap();
        assert_eq!(body, "beta");
    }

    #[test]
    fn appending_the_same_name_twice_keeps_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("out.zip");
        append(&archive, &write(dir.path(), "a.txt", "one")).unwrap();
        let again = write(dir.path(), "a.txt", "two");
        append(&archive, &again).unwrap();
        assert_eq!(entry_names(&archive).unwrap(), vec!["a.txt"]);
        assert!(!again.exists());
    }

    #[test]
    fn missing_source_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = append(&dir.path().join("out.zip"), &dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, ArchiveError::Io { .. }));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        assert!(matches!(
            ArchiveFormat::from_path(Path::new("notes.7z")),
            Err(ArchiveError::UnsupportedFormat(name)) if name == "notes.7z"
        ));
        assert_eq!(ArchiveFormat::from_path(Path::new("X.ZIP")).unwrap(), ArchiveFormat::Zip);
        assert_eq!(ArchiveFormat::from_path(Path::new("x.rar")).unwrap(), ArchiveFormat::Rar);
        assert_eq!(ArchiveFormat::from_path(Path::new("x.RAR")).unwrap(), ArchiveFormat::Rar);
    }

    #[test]
    fn extract_flattens_and_skips_escaping_names() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("in.zip");
        {
            let mut zip = ZipWriter::new(File::create(&archive).unwrap());
            let opts = SimpleFileOptions::default();
            zip.add_directory("docs/", opts).unwrap();
            for (name, body) in [
                ("docs/report.pdf", "r1"),
                ("other/report.pdf", "r2"),
                ("../evil.sh", "x"),
                ("top.txt", "t"),
            ] {
                zip.start_file(name, opts).unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }

        let out = dir.path().join("out");
        let files = extract_all(&archive, &out).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["report.pdf", "report (1).pdf", "top.txt"]);
        assert_eq!(std::fs::read_to_string(out.join("report (1).pdf")).unwrap(), "r2");
        assert!(!dir.path().join("evil.sh").exists());
    }

    // Stored RAR 4 archive holding docs\report.txt, other\report.txt,
    // ..\evil.txt and top.txt.
    fn rar_fixture() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/members.rar")
    }

    #[test]
    fn rar_members_are_flattened_and_escapes_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("in.rar");
        std::fs::copy(rar_fixture(), &archive).unwrap();

        let out = dir.path().join("out");
        let files = extract_all(&archive, &out).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["report.txt", "report (1).txt", "top.txt"]);
        assert_eq!(std::fs::read_to_string(out.join("report.txt")).unwrap(), "r1");
        assert_eq!(std::fs::read_to_string(out.join("report (1).txt")).unwrap(), "r2");
        assert!(files.iter().all(|p| p.starts_with(&out)));
        assert!(!dir.path().join("evil.txt").exists());
    }

    #[test]
    fn corrupt_rar_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write(dir.path(), "bad.rar", "not a rar at all");
        let err = extract_all(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, ArchiveError::Format { .. }));
    }

    #[test]
    fn corrupt_zip_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write(dir.path(), "bad.zip", "not a zip at all");
        let err = extract_all(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, ArchiveError::Format { .. }));
    }

    #[tokio::test]
    async fn async_wrappers_run_on_the_blocking_pool() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("out.zip");
        let a = write(dir.path(), "a.txt", "alpha");
        append_async(archive.clone(), a).await.unwrap();
        let files = extract_all_async(archive, dir.path().join("x")).await.unwrap();
        assert_eq!(files, vec![dir.path().join("x").join("a.txt")]);
    }
}
