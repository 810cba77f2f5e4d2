//! Deterministic item identifier derivation for library folder entries
//!
//! The container format tags each folder entry with an `itemID` attribute of
//! the shape `0000XXXX-0000YYYY`. The authoring tool compares these ids
//! across containers, so they must be stable across processes and runs:
//! identical paths always derive identical ids. We hash the UTF-8 path bytes
//! and take the first two 4-character hex fragments.

use sha2::{Digest, Sha256};

/// Derive the `0000XXXX-0000YYYY` item id for a folder path.
///
/// Pure and deterministic: no I/O, no random state.
///
/// # Examples
///
/// ```
/// use flamerge::ident::item_id;
///
/// let id = item_id("ui/buttons");
/// assert_eq!(id, item_id("ui/buttons"));
/// assert_eq!(id.len(), 17);
/// ```
pub fn item_id(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("0000{}-0000{}", &digest[..4], &digest[4..8])
}
