//! Ordered raw-attribute bag for container XML elements
//!
//! Symbol reference entries and backing-document root elements carry
//! attribute sets that must be copied back out verbatim, in a stable order,
//! including attributes this engine does not interpret. [`AttrBag`] keeps
//! the full ordered bag and layers typed accessors for the handful of flags
//! the merge engine does reason about (`href`, `loadImmediate`,
//! `linkageClassName`, `linkageExportForAS`), so known flags are never
//! handled by string-keyed guessing at call sites.

/// Attribute key for a symbol's virtual library path.
pub const HREF: &str = "href";
/// Flag forcing the authoring tool to load an exported class at startup.
pub const LOAD_IMMEDIATE: &str = "loadImmediate";
/// Exported class name attached to a symbol.
pub const LINKAGE_CLASS_NAME: &str = "linkageClassName";
/// Flag marking a symbol as exported for scripting.
pub const LINKAGE_EXPORT: &str = "linkageExportForAS";
/// Namespace declaration on a backing document root.
pub const XMLNS: &str = "xmlns";

/// An insertion-ordered string attribute bag.
///
/// First-insertion order is preserved on serialization; setting an existing
/// key updates it in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrBag {
    entries: Vec<(String, String)>,
}

impl AttrBag {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an attribute value by key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, preserving its position if it already exists
    pub fn set(&mut self, key: &str, value: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value.to_string();
        } else {
            self.entries.push((key.to_string(), value.to_string()));
        }
    }

    /// Remove an attribute, returning its value if it was present
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Check whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterate over `(key, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of attributes in the bag
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the bag is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The symbol's virtual library path, when present
    pub fn href(&self) -> Option<&str> {
        self.get(HREF)
    }

    /// Whether the eager class-load flag is set
    pub fn load_immediate(&self) -> bool {
        self.contains(LOAD_IMMEDIATE)
    }

    /// The exported class name, when present
    pub fn linkage_class_name(&self) -> Option<&str> {
        self.get(LINKAGE_CLASS_NAME)
    }

    /// Render the bag as an XML tag with the given element name.
    ///
    /// Attribute values have `&` escaped; everything else is emitted
    /// verbatim, matching what the container document stores. When
    /// `self_closing` is false the tag is left open for the caller to splice
    /// ahead of existing element content.
    pub fn to_tag(&self, element: &str, self_closing: bool) -> String {
        let mut out = String::from("<");
        out.push_str(element);
        for (key, value) in self.iter() {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&value.replace('&', "&amp;"));
            out.push('"');
        }
        out.push_str(if self_closing { "/>" } else { ">" });
        out
    }
}

impl FromIterator<(String, String)> for AttrBag {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut bag = AttrBag::new();
        for (k, v) in iter {
            bag.set(&k, &v);
        }
        bag
    }
}
