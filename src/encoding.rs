//! Filename normalization for extracted container trees
//!
//! Third-party unzip tools (and case-insensitive filesystems) can leave the
//! extracted files under names that no longer match the hrefs referenced in
//! the container document: decomposed Unicode on one platform, a stray case
//! difference on another. Symbols would then be reported missing even though
//! their backing files are sitting right there.
//!
//! [`reconcile`] repairs this before a backing file is opened: when the
//! expected path is absent, the parent directory is scanned for a sibling
//! whose NFC-normalized or case-folded name matches, and that sibling is
//! renamed into place. The rename goes through an intermediate name so it
//! also works on filesystems where the source and target compare equal.

use std::fs;
use std::path::Path;

use unicode_normalization::UnicodeNormalization;

use crate::error::Result;

/// Apply canonical (NFC) Unicode normalization to a file or folder name.
pub fn normalize_name(raw: &str) -> String {
    raw.nfc().collect()
}

/// Ensure the file or directory at `path` exists under that exact name,
/// renaming an encoding- or case-mangled sibling into place if needed.
///
/// Does nothing when `path` already exists or no candidate sibling is found;
/// a missing file is not an error at this layer.
pub fn reconcile(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    let Some(parent) = path.parent().filter(|p| p.is_dir()) else {
        return Ok(());
    };
    let Some(wanted) = path.file_name().and_then(|n| n.to_str()) else {
        return Ok(());
    };
    let wanted = normalize_name(wanted);
    let wanted_folded = wanted.to_lowercase();

    for entry in fs::read_dir(parent)? {
        let entry = entry?;
        let candidate = entry.file_name();
        let Some(candidate) = candidate.to_str() else {
            continue;
        };
        let normalized = normalize_name(candidate);
        if normalized == wanted || normalized.to_lowercase() == wanted_folded {
            log::debug!(
                "reconciling '{}' -> '{}' in {}",
                candidate,
                wanted,
                parent.display()
            );
            // Two-step rename: on a case-insensitive filesystem the source
            // and target names may compare equal.
            let staging = parent.join(format!("{wanted}.reconcile-tmp"));
            fs::rename(entry.path(), &staging)?;
            fs::rename(&staging, path)?;
            return Ok(());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_name_composes() {
        // "é" as 'e' + combining acute vs. precomposed
        let decomposed = "Cafe\u{0301}.xml";
        let composed = "Caf\u{00e9}.xml";
        assert_eq!(normalize_name(decomposed), composed);
        assert_eq!(normalize_name(composed), composed);
    }

    #[test]
    fn test_reconcile_noop_when_present() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Button.xml");
        fs::write(&path, "<DOMSymbolItem/>").unwrap();
        reconcile(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_reconcile_renames_decomposed_sibling() {
        let dir = TempDir::new().unwrap();
        let mangled = dir.path().join("Cafe\u{0301}.xml");
        fs::write(&mangled, "<DOMSymbolItem/>").unwrap();

        let wanted = dir.path().join("Caf\u{00e9}.xml");
        reconcile(&wanted).unwrap();
        assert!(wanted.exists());
    }

    #[test]
    fn test_reconcile_renames_case_mismatch() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("button.xml"), "<DOMSymbolItem/>").unwrap();

        let wanted = dir.path().join("Button.xml");
        reconcile(&wanted).unwrap();
        assert!(wanted.exists());
        assert!(fs::read_dir(dir.path()).unwrap().count() == 1);
    }

    #[test]
    fn test_reconcile_missing_with_no_candidate() {
        let dir = TempDir::new().unwrap();
        let wanted = dir.path().join("Nothing.xml");
        reconcile(&wanted).unwrap();
        assert!(!wanted.exists());
    }
}
