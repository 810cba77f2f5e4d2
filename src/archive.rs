//! Archive collaborator: zip extraction and compression
//!
//! A container file is a plain zip archive. This module is the boundary the
//! merge engine talks to; it knows nothing about the container layout beyond
//! storing member paths relative to the packed directory root, which the
//! authoring tool requires.

use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::{Error, Result};

/// Unpack a zip archive into `dest`.
///
/// A file that is not a valid zip archive yields a recoverable
/// [`Error::Archive`], not a panic; the caller decides whether to skip that
/// input or abort.
pub fn extract(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| Error::Archive {
        path: archive_path.to_path_buf(),
        message: format!("not a valid zip archive: {e}"),
    })?;
    archive.extract(dest).map_err(|e| Error::Archive {
        path: archive_path.to_path_buf(),
        message: format!("extraction failed: {e}"),
    })?;
    log::debug!(
        "extracted {} entries from {} into {}",
        archive.len(),
        archive_path.display(),
        dest.display()
    );
    Ok(())
}

/// Pack the contents of `dir` into a zip archive at `archive_path`.
///
/// Member paths are stored relative to `dir`, never absolute.
pub fn compress(dir: &Path, archive_path: &Path) -> Result<()> {
    let file = fs::File::create(archive_path)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Archive {
            path: dir.to_path_buf(),
            message: format!("walk failed: {e}"),
        })?;
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| Error::Path {
                message: format!("{}: {e}", entry.path().display()),
            })?
            .to_string_lossy()
            .replace('\\', "/");

        if entry.file_type().is_dir() {
            writer
                .add_directory(relative, options)
                .map_err(|e| Error::Archive {
                    path: archive_path.to_path_buf(),
                    message: format!("add directory failed: {e}"),
                })?;
        } else if entry.file_type().is_file() {
            writer
                .start_file(relative, options)
                .map_err(|e| Error::Archive {
                    path: archive_path.to_path_buf(),
                    message: format!("start file failed: {e}"),
                })?;
            let mut source = fs::File::open(entry.path())?;
            io::copy(&mut source, &mut writer)?;
        }
    }

    writer.finish().map_err(|e| Error::Archive {
        path: archive_path.to_path_buf(),
        message: format!("finalize failed: {e}"),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_compress_then_extract_round_trip() {
        let source = TempDir::new().unwrap();
        fs::write(source.path().join("mimetype"), "application/vnd.adobe.xfl").unwrap();
        fs::create_dir_all(source.path().join("LIBRARY/ui")).unwrap();
        fs::write(source.path().join("LIBRARY/ui/Button.xml"), "<DOMSymbolItem/>").unwrap();

        let out = TempDir::new().unwrap();
        let archive = out.path().join("packed.fla");
        compress(source.path(), &archive).unwrap();

        let dest = TempDir::new().unwrap();
        extract(&archive, dest.path()).unwrap();
        assert_eq!(
            fs::read_to_string(dest.path().join("mimetype")).unwrap(),
            "application/vnd.adobe.xfl"
        );
        assert_eq!(
            fs::read_to_string(dest.path().join("LIBRARY/ui/Button.xml")).unwrap(),
            "<DOMSymbolItem/>"
        );
    }

    #[test]
    fn test_extract_rejects_non_zip() {
        let dir = TempDir::new().unwrap();
        let bogus = dir.path().join("bogus.fla");
        fs::write(&bogus, "this is not a zip archive").unwrap();

        let dest = TempDir::new().unwrap();
        let err = extract(&bogus, dest.path()).unwrap_err();
        assert!(matches!(err, Error::Archive { .. }));
        assert!(err.to_string().contains("not a valid zip archive"));
    }

    #[test]
    fn test_extract_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = extract(&dir.path().join("absent.fla"), dir.path()).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
