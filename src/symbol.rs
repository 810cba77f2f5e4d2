//! # Symbols and Symbol Instances
//!
//! A [`Symbol`] wraps one library item: the reference-tag attributes copied
//! from the container document plus the item's own backing XML file under
//! `LIBRARY/<href>`. The backing document describes the symbol's timeline,
//! and every `DOMSymbolInstance` element inside it is a placement of another
//! library item is the raw material for dependency resolution.
//!
//! The backing document's namespace is sniffed once at load time from the
//! root element: the format may omit the `xmlns` declaration, but all child
//! elements are implicitly in that namespace, so it is captured as an
//! explicit attribute instead of being re-derived by string splitting later.
//!
//! Scans are streaming (`quick-xml`), in document order. Instance lists are
//! recomputed on every scan; the transitive dependency closure is cached on
//! the symbol and invalidated by any backing-document mutation.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;

use crate::attrs::{AttrBag, LINKAGE_CLASS_NAME, LINKAGE_EXPORT, LOAD_IMMEDIATE, XMLNS};
use crate::encoding;
use crate::error::{Error, Result};

/// Characters the container format encodes as `&#NN` (no terminating
/// semicolon) in hrefs and library item names.
const ENTITY_FIX: [char; 3] = [':', '<', '>'];

/// A placement of a library item on a specific timeline/layer/frame inside
/// another symbol's backing document.
///
/// Recomputed on every scan; never persisted independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInstance {
    /// Library path of the placed symbol, in map-key form (entity-escaped).
    pub library_item: String,
    /// Instance name on stage (may be empty).
    pub name: String,
    /// 1-based frame index; the source attribute is 0-based.
    pub frame_index: u32,
    /// Name of the layer holding the instance.
    pub layer: String,
    /// Name of the timeline holding the layer.
    pub timeline: String,
}

/// One library item: reference-tag attributes plus its backing XML document.
#[derive(Debug, Clone)]
pub struct Symbol {
    /// Logical name: href basename minus the `.xml` extension.
    name: String,
    /// Full href minus the extension; the library map key.
    path: String,
    /// Virtual library path including the `.xml` extension; unique per library.
    href: String,
    /// Verbatim reference-tag attributes from the container document.
    attrs: AttrBag,
    /// Location of the backing XML file on disk.
    backing_path: PathBuf,
    /// Backing document text, owned.
    source: String,
    /// Root element name of the backing document.
    root_name: String,
    /// Root element attributes, with `xmlns` made explicit.
    root_attrs: AttrBag,
    /// Namespace sniffed from the root element (empty when undeclared).
    namespace: String,
    /// Cached exported class name, filled by [`Symbol::set_linkage`].
    linkage: Option<String>,
    /// Cached transitive dependency closure, by library path.
    deps: RefCell<Option<BTreeSet<String>>>,
}

impl Symbol {
    /// Load a symbol from its reference-tag attributes, resolving and parsing
    /// the backing file under `workdir/LIBRARY/<href>`.
    ///
    /// The on-disk filename is reconciled against encoding and case mangling
    /// before the existence check. Fails with [`Error::MissingBackingFile`]
    /// when the backing file is absent; the caller's load policy decides
    /// whether that aborts the whole container load.
    pub fn load(attrs: AttrBag, workdir: &Path) -> Result<Symbol> {
        let href = attrs
            .href()
            .ok_or_else(|| Error::MalformedDocument {
                message: "symbol reference entry without an href attribute".to_string(),
            })?
            .to_string();
        let path = href.strip_suffix(".xml").unwrap_or(&href).to_string();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();

        let backing_path = workdir.join("LIBRARY").join(&href);
        encoding::reconcile(&backing_path)?;
        if !backing_path.is_file() {
            return Err(Error::MissingBackingFile { href, path: backing_path });
        }

        let source = fs::read_to_string(&backing_path)?;
        let (root_name, mut root_attrs) = sniff_root(&source)?;
        let namespace = root_attrs.get(XMLNS).unwrap_or_default().to_string();
        root_attrs.set(XMLNS, &namespace);

        Ok(Symbol {
            name,
            path,
            href,
            attrs,
            backing_path,
            source,
            root_name,
            root_attrs,
            namespace,
            linkage: None,
            deps: RefCell::new(None),
        })
    }

    /// Logical name (href basename minus extension)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Library path: the href minus its extension, used as the map key and
    /// as the target of `libraryItemName` references
    pub fn library_path(&self) -> &str {
        &self.path
    }

    /// Virtual library path including the `.xml` extension
    pub fn href(&self) -> &str {
        &self.href
    }

    /// Reference-tag attributes, verbatim
    pub fn attrs(&self) -> &AttrBag {
        &self.attrs
    }

    /// Namespace of the backing document (empty when undeclared)
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Location of the backing XML file on disk
    pub fn backing_path(&self) -> &Path {
        &self.backing_path
    }

    /// The exported class name, if any.
    ///
    /// Reads the cached value when [`Symbol::set_linkage`] has run, otherwise
    /// the `linkageClassName` root attribute. Absence means the symbol is
    /// unlinked, not an error.
    pub fn linkage(&self) -> Option<&str> {
        self.linkage
            .as_deref()
            .or_else(|| self.root_attrs.linkage_class_name())
    }

    /// Export the symbol under the given class name.
    ///
    /// Sets `linkageClassName` and `linkageExportForAS` on the backing
    /// document's root element, rewrites only the root start tag in the
    /// source text, and persists the backing file immediately. The
    /// `loadImmediate` reference flag is dropped: with an explicit linkage it
    /// would otherwise force the authoring tool to eagerly load the class at
    /// startup. Any cached dependency closure is invalidated.
    pub fn set_linkage(&mut self, class_name: &str) -> Result<()> {
        self.root_attrs.set(LINKAGE_CLASS_NAME, class_name);
        self.root_attrs.set(LINKAGE_EXPORT, "true");
        self.rewrite_root_tag()?;
        fs::write(&self.backing_path, &self.source)?;

        self.attrs.remove(LOAD_IMMEDIATE);
        self.linkage = Some(class_name.to_string());
        self.invalidate_dependencies();
        log::debug!("exported symbol '{}' as class '{}'", self.path, class_name);
        Ok(())
    }

    /// Direct symbol placements in this symbol's backing document, in
    /// document order: timeline, then layer, then frame, then instance.
    ///
    /// Does not recurse into the placed symbols' own instances, and does not
    /// resolve the references; resolution against the owning library happens
    /// in [`Library`](crate::library::Library).
    pub fn instances(&self) -> Result<Vec<SymbolInstance>> {
        let mut reader = Reader::from_str(&self.source);
        let mut timelines: Vec<String> = Vec::new();
        let mut layers: Vec<String> = Vec::new();
        let mut frames: Vec<u32> = Vec::new();
        let mut found = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"DOMTimeline" => {
                        timelines.push(attr_value(&e, b"name")?.unwrap_or_default());
                    }
                    b"DOMLayer" => {
                        layers.push(attr_value(&e, b"name")?.unwrap_or_default());
                    }
                    b"DOMFrame" => {
                        frames.push(frame_index(&e, &self.path)?);
                    }
                    b"DOMSymbolInstance" => {
                        self.collect_instance(&e, &timelines, &layers, &frames, &mut found)?;
                    }
                    _ => {}
                },
                Event::Empty(e) => {
                    if e.local_name().as_ref() == b"DOMSymbolInstance" {
                        self.collect_instance(&e, &timelines, &layers, &frames, &mut found)?;
                    }
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"DOMTimeline" => {
                        timelines.pop();
                    }
                    b"DOMLayer" => {
                        layers.pop();
                    }
                    b"DOMFrame" => {
                        frames.pop();
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(found)
    }

    /// Render the reference tag spliced back into the container document's
    /// symbol list.
    pub fn reference_tag(&self) -> String {
        self.attrs.to_tag("Include", true)
    }

    /// Cached dependency closure, if one has been computed
    pub(crate) fn cached_dependencies(&self) -> Option<BTreeSet<String>> {
        self.deps.borrow().clone()
    }

    /// Store a computed dependency closure
    pub(crate) fn cache_dependencies(&self, closure: BTreeSet<String>) {
        *self.deps.borrow_mut() = Some(closure);
    }

    /// Drop the cached dependency closure after a backing-document mutation
    pub(crate) fn invalidate_dependencies(&self) {
        *self.deps.borrow_mut() = None;
    }

    /// Repoint the backing file after a merge copied it into a new working
    /// directory.
    pub(crate) fn set_backing_path(&mut self, path: PathBuf) {
        self.backing_path = path;
    }

    fn collect_instance(
        &self,
        e: &BytesStart<'_>,
        timelines: &[String],
        layers: &[String],
        frames: &[u32],
        found: &mut Vec<SymbolInstance>,
    ) -> Result<()> {
        // Instances only count inside a timeline/layer/frame context.
        let (Some(timeline), Some(layer), Some(frame_index)) =
            (timelines.last(), layers.last(), frames.last())
        else {
            return Ok(());
        };
        let library_item = attr_value(e, b"libraryItemName")?.ok_or_else(|| {
            Error::MalformedDocument {
                message: format!(
                    "DOMSymbolInstance without libraryItemName in symbol '{}'",
                    self.path
                ),
            }
        })?;
        found.push(SymbolInstance {
            library_item: escape_library_item(&library_item),
            name: attr_value(e, b"name")?.unwrap_or_default(),
            frame_index: *frame_index,
            layer: layer.clone(),
            timeline: timeline.clone(),
        });
        Ok(())
    }

    /// Replace the root start tag in the source text with one rendered from
    /// `root_attrs`, leaving nested elements that share the tag name alone.
    fn rewrite_root_tag(&mut self) -> Result<()> {
        let pattern = format!("<{}[^>]*>", regex::escape(&self.root_name));
        let re = Regex::new(&pattern).map_err(|e| Error::MalformedDocument {
            message: format!("root tag pattern for '{}': {e}", self.root_name),
        })?;
        let found = re.find(&self.source).ok_or_else(|| Error::MalformedDocument {
            message: format!(
                "root tag <{}> not found in backing document of '{}'",
                self.root_name, self.path
            ),
        })?;
        let self_closing = found.as_str().ends_with("/>");
        let tag = self.root_attrs.to_tag(&self.root_name, self_closing);

        let mut updated = String::with_capacity(self.source.len() + tag.len());
        updated.push_str(&self.source[..found.start()]);
        updated.push_str(&tag);
        updated.push_str(&self.source[found.end()..]);
        self.source = updated;
        Ok(())
    }
}

/// Re-escape the characters the container format encodes in hrefs, so a
/// decoded `libraryItemName` matches its href-derived map key.
///
/// Hrefs encode these as `&#NN` without the terminating semicolon; emitting
/// a well-formed character reference here would never match a key derived
/// from an on-disk filename.
pub fn escape_library_item(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if ENTITY_FIX.contains(&c) {
            out.push_str(&format!("&#{}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Read the root element's name and attributes, making the sniffed namespace
/// available through the returned bag's `xmlns` entry.
fn sniff_root(source: &str) -> Result<(String, AttrBag)> {
    let mut reader = Reader::from_str(source);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let bag = element_attrs(&e)?;
                return Ok((name, bag));
            }
            Event::Eof => {
                return Err(Error::MalformedDocument {
                    message: "backing document has no root element".to_string(),
                })
            }
            _ => {}
        }
    }
}

/// Collect every attribute of an element into an ordered bag, entity-decoded.
pub(crate) fn element_attrs(e: &BytesStart<'_>) -> Result<AttrBag> {
    let mut bag = AttrBag::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = decode_entities(&String::from_utf8_lossy(&attr.value));
        bag.set(&key, &value);
    }
    Ok(bag)
}

/// Read and entity-decode one attribute by local name.
fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == key {
            let raw = String::from_utf8_lossy(&attr.value);
            return Ok(Some(decode_entities(&raw)));
        }
    }
    Ok(None)
}

/// 1-based frame index from a frame element's 0-based `index` attribute.
/// The attribute is required; the format always writes it.
fn frame_index(e: &BytesStart<'_>, symbol: &str) -> Result<u32> {
    let raw = attr_value(e, b"index")?.ok_or_else(|| Error::MalformedDocument {
        message: format!("DOMFrame without an index attribute in symbol '{symbol}'"),
    })?;
    let index: u32 = raw.parse().map_err(|_| Error::MalformedDocument {
        message: format!("frame index '{raw}' in symbol '{symbol}' is not a number"),
    })?;
    Ok(index + 1)
}

/// Decode XML character and entity references in an attribute value.
fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let Some(end) = tail.find(';') else {
            out.push_str(tail);
            rest = "";
            break;
        };
        let entity = &tail[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity.strip_prefix('#').and_then(|num| {
                let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => num.parse::<u32>().ok(),
                };
                code.and_then(char::from_u32)
            }),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const NS: &str = "http://ns.adobe.com/xfl/2008/";

    fn backing_doc(instances: &str) -> String {
        format!(
            r#"<DOMSymbolItem xmlns="{NS}" name="Thing" itemID="00000001-00000001">
  <timeline>
    <DOMTimeline name="Thing">
      <layers>
        <DOMLayer name="Layer 1">
          <frames>
            <DOMFrame index="0">
              <elements>
                {instances}
              </elements>
            </DOMFrame>
          </frames>
        </DOMLayer>
      </layers>
    </DOMTimeline>
  </timeline>
</DOMSymbolItem>"#
        )
    }

    fn write_symbol(dir: &Path, href: &str, body: &str) {
        let path = dir.join("LIBRARY").join(href);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn load_symbol(dir: &Path, href: &str) -> Symbol {
        let mut attrs = AttrBag::new();
        attrs.set("href", href);
        Symbol::load(attrs, dir).unwrap()
    }

    #[test]
    fn test_load_derives_name_and_path() {
        let dir = TempDir::new().unwrap();
        write_symbol(dir.path(), "ui/Button.xml", &backing_doc(""));
        let symbol = load_symbol(dir.path(), "ui/Button.xml");
        assert_eq!(symbol.name(), "Button");
        assert_eq!(symbol.library_path(), "ui/Button");
        assert_eq!(symbol.href(), "ui/Button.xml");
        assert_eq!(symbol.namespace(), NS);
    }

    #[test]
    fn test_load_missing_backing_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("LIBRARY")).unwrap();
        let mut attrs = AttrBag::new();
        attrs.set("href", "Ghost.xml");
        let err = Symbol::load(attrs, dir.path()).unwrap_err();
        assert!(matches!(err, Error::MissingBackingFile { .. }));
    }

    #[test]
    fn test_load_sniffs_missing_namespace_as_empty() {
        let dir = TempDir::new().unwrap();
        write_symbol(dir.path(), "Plain.xml", "<DOMSymbolItem name=\"Plain\"/>");
        let symbol = load_symbol(dir.path(), "Plain.xml");
        assert_eq!(symbol.namespace(), "");
    }

    #[test]
    fn test_instances_frame_index_is_one_based() {
        let dir = TempDir::new().unwrap();
        write_symbol(
            dir.path(),
            "Scene.xml",
            &backing_doc(r#"<DOMSymbolInstance libraryItemName="ui/Button" name="btn"/>"#),
        );
        let symbol = load_symbol(dir.path(), "Scene.xml");
        let instances = symbol.instances().unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].frame_index, 1);
        assert_eq!(instances[0].library_item, "ui/Button");
        assert_eq!(instances[0].name, "btn");
        assert_eq!(instances[0].layer, "Layer 1");
        assert_eq!(instances[0].timeline, "Thing");
    }

    #[test]
    fn test_instances_are_direct_children_in_document_order() {
        let dir = TempDir::new().unwrap();
        write_symbol(
            dir.path(),
            "Scene.xml",
            &backing_doc(
                r#"<DOMSymbolInstance libraryItemName="B" name="b"/>
                   <DOMSymbolInstance libraryItemName="A" name="a"/>"#,
            ),
        );
        let symbol = load_symbol(dir.path(), "Scene.xml");
        let instances = symbol.instances().unwrap();
        let items: Vec<&str> = instances.iter().map(|i| i.library_item.as_str()).collect();
        assert_eq!(items, vec!["B", "A"]);
    }

    #[test]
    fn test_frame_without_index_is_malformed() {
        let dir = TempDir::new().unwrap();
        write_symbol(
            dir.path(),
            "Bad.xml",
            &format!(
                r#"<DOMSymbolItem xmlns="{NS}" name="Bad">
                     <DOMTimeline name="t"><DOMLayer name="l">
                       <DOMFrame>
                         <DOMSymbolInstance libraryItemName="X" name="x"/>
                       </DOMFrame>
                     </DOMLayer></DOMTimeline>
                   </DOMSymbolItem>"#
            ),
        );
        let symbol = load_symbol(dir.path(), "Bad.xml");
        let err = symbol.instances().unwrap_err();
        assert!(matches!(err, Error::MalformedDocument { .. }));
    }

    #[test]
    fn test_instance_outside_frame_context_is_ignored() {
        let dir = TempDir::new().unwrap();
        write_symbol(
            dir.path(),
            "Odd.xml",
            &format!(
                r#"<DOMSymbolItem xmlns="{NS}" name="Odd">
                     <DOMSymbolInstance libraryItemName="Stray" name="s"/>
                   </DOMSymbolItem>"#
            ),
        );
        let symbol = load_symbol(dir.path(), "Odd.xml");
        assert!(symbol.instances().unwrap().is_empty());
    }

    #[test]
    fn test_library_item_entities_are_reescaped() {
        let dir = TempDir::new().unwrap();
        write_symbol(
            dir.path(),
            "Scene.xml",
            &backing_doc(r#"<DOMSymbolInstance libraryItemName="pkg&#58;Sprite" name="s"/>"#),
        );
        let symbol = load_symbol(dir.path(), "Scene.xml");
        let instances = symbol.instances().unwrap();
        // Hrefs carry `&#58` without the semicolon; the re-escaped name must
        // match that form, not the well-formed character reference.
        assert_eq!(instances[0].library_item, "pkg&#58Sprite");
    }

    #[test]
    fn test_linkage_reads_root_attribute() {
        let dir = TempDir::new().unwrap();
        write_symbol(
            dir.path(),
            "Linked.xml",
            &format!(r#"<DOMSymbolItem xmlns="{NS}" name="Linked" linkageClassName="app.Linked"/>"#),
        );
        let symbol = load_symbol(dir.path(), "Linked.xml");
        assert_eq!(symbol.linkage(), Some("app.Linked"));

        write_symbol(dir.path(), "Bare.xml", &backing_doc(""));
        let bare = load_symbol(dir.path(), "Bare.xml");
        assert_eq!(bare.linkage(), None);
    }

    #[test]
    fn test_set_linkage_rewrites_only_root_tag_and_persists() {
        let dir = TempDir::new().unwrap();
        // A nested element sharing the root tag name must stay untouched.
        let body = format!(
            "<DOMSymbolItem xmlns=\"{NS}\" name=\"Outer\">\n  \
               <inner><DOMSymbolItem name=\"Nested\"/></inner>\n\
             </DOMSymbolItem>"
        );
        write_symbol(dir.path(), "Outer.xml", &body);

        let mut attrs = AttrBag::new();
        attrs.set("href", "Outer.xml");
        attrs.set("loadImmediate", "true");
        let mut symbol = Symbol::load(attrs, dir.path()).unwrap();

        symbol.set_linkage("app.Outer").unwrap();
        assert_eq!(symbol.linkage(), Some("app.Outer"));
        assert!(!symbol.attrs().contains(LOAD_IMMEDIATE));

        let written = fs::read_to_string(dir.path().join("LIBRARY/Outer.xml")).unwrap();
        assert!(written.contains(r#"linkageClassName="app.Outer""#));
        assert!(written.contains(r#"linkageExportForAS="true""#));
        // Nested tag untouched, still without linkage attributes.
        assert!(written.contains(r#"<DOMSymbolItem name="Nested"/>"#));
        assert_eq!(written.matches("linkageClassName").count(), 1);
    }

    #[test]
    fn test_set_linkage_invalidates_dependency_cache() {
        let dir = TempDir::new().unwrap();
        write_symbol(dir.path(), "Thing.xml", &backing_doc(""));
        let mut symbol = load_symbol(dir.path(), "Thing.xml");

        symbol.cache_dependencies(BTreeSet::from(["X".to_string()]));
        assert!(symbol.cached_dependencies().is_some());
        symbol.set_linkage("app.Thing").unwrap();
        assert!(symbol.cached_dependencies().is_none());
    }

    #[test]
    fn test_reference_tag_escapes_ampersand() {
        let dir = TempDir::new().unwrap();
        write_symbol(dir.path(), "pkg&#58Sprite.xml", &backing_doc(""));
        let symbol = load_symbol(dir.path(), "pkg&#58Sprite.xml");
        assert_eq!(
            symbol.reference_tag(),
            r#"<Include href="pkg&amp;#58Sprite.xml"/>"#
        );
    }

    #[test]
    fn test_escape_library_item() {
        assert_eq!(escape_library_item("a:b"), "a&#58b");
        assert_eq!(escape_library_item("x<y>z"), "x&#60y&#62z");
        assert_eq!(escape_library_item("plain/Name"), "plain/Name");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a&amp;b"), "a&b");
        assert_eq!(decode_entities("&lt;tag&gt;"), "<tag>");
        assert_eq!(decode_entities("&#58;"), ":");
        assert_eq!(decode_entities("&#x3A;"), ":");
        assert_eq!(decode_entities("no entities"), "no entities");
        assert_eq!(decode_entities("&unknown;x"), "&unknown;x");
    }
}
