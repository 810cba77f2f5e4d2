//! # Library Model, Dependency Resolution, and the Merge Engine
//!
//! A [`Library`] is the in-memory model of one container: a symbol map keyed
//! by library path, an insertion-ordered folder list, and a private working
//! directory holding the extracted files. The module owns the three
//! algorithms with real invariants:
//!
//! - **Loading** builds folders and symbols from the container document in
//!   document order, under an explicit [`LoadPolicy`]: a missing backing
//!   file either fails the whole load (`Strict`) or skips the symbol and
//!   surfaces the omission (`Lenient`). The two legacy revisions of this
//!   logic disagreed; the policy makes the choice caller-visible.
//! - **Dependency resolution** walks instance references to a transitive
//!   closure with a visited set, so reference cycles terminate. A symbol
//!   reachable through a cycle back to the start is included in its own
//!   closure.
//! - **Merging** unions two symbol maps under an explicit [`MergePolicy`]
//!   (right-biased by default), copies (never moves) every backing file
//!   into the result's fresh working directory, and rebuilds the complete
//!   folder hierarchy implied by the merged hrefs.
//!
//! Working directories are scoped resources: a library created from an
//! extracted archive or a merge owns a `TempDir` that is removed on drop, on
//! every exit path. Two libraries never share a working directory, and merge
//! results never alias files still owned by an input.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use tempfile::TempDir;

use crate::attrs::AttrBag;
use crate::encoding;
use crate::error::{Error, Result};
use crate::ident;
use crate::symbol::{element_attrs, Symbol, SymbolInstance};

/// How a load reacts to missing backing files and unresolved instance
/// references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Fail the whole operation on the first missing file or unresolved
    /// reference.
    Strict,
    /// Skip the offending symbol or reference, record it, and log a warning.
    #[default]
    Lenient,
}

/// Tie-break rule for symbol-name collisions during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// The left (self) operand's symbol survives.
    KeepLeft,
    /// The right (other) operand's symbol survives. Last writer wins; this
    /// matches the historical merge behavior and is the default.
    #[default]
    KeepRight,
    /// A collision is an error ([`Error::DuplicateSymbolKey`]).
    RejectOnConflict,
}

/// One folder entry in the container's library tree.
///
/// The display name equals the path; the item id is derived from the path
/// (stable across processes, since the authoring tool compares ids across
/// containers). Folders are always rebuilt from the symbol set when it
/// changes, never hand-edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    /// Slash-separated virtual path; the unique key.
    pub path: String,
    /// Derived `0000XXXX-0000YYYY` identifier.
    pub item_id: String,
}

impl Folder {
    /// Create a folder entry for a path, deriving its item id
    pub fn new(path: &str) -> Folder {
        Folder {
            item_id: ident::item_id(path),
            path: path.to_string(),
        }
    }

    /// Render the folder entry for the container document's folder list
    pub fn to_tag(&self) -> String {
        let mut bag = AttrBag::new();
        bag.set("name", &self.path);
        bag.set("itemID", &self.item_id);
        bag.to_tag("DOMFolderItem", true)
    }
}

/// The in-memory model of one container's folder hierarchy and symbol set.
#[derive(Debug)]
pub struct Library {
    /// Symbols keyed by library path (href minus the extension).
    symbols: HashMap<String, Symbol>,
    /// Folder entries in insertion order (deterministic output).
    folders: Vec<Folder>,
    /// Membership index over `folders`.
    folder_paths: HashSet<String>,
    /// Owned scratch directory, removed when the library is dropped.
    workdir: TempDir,
    policy: LoadPolicy,
    /// Hrefs omitted under the lenient policy, surfaced to the caller.
    skipped: Vec<String>,
}

impl Library {
    /// Create an empty library with a fresh scratch working directory.
    pub fn empty(policy: LoadPolicy) -> Result<Library> {
        let workdir = TempDir::new()?;
        fs::create_dir_all(workdir.path().join("LIBRARY"))?;
        Ok(Library {
            symbols: HashMap::new(),
            folders: Vec::new(),
            folder_paths: HashSet::new(),
            workdir,
            policy,
            skipped: Vec::new(),
        })
    }

    /// Load a library from an extracted container tree the library takes
    /// ownership of. The directory is removed when the library is dropped.
    pub fn load_extracted(workdir: TempDir, policy: LoadPolicy) -> Result<Library> {
        let document_path = workdir.path().join("DOMDocument.xml");
        if !document_path.is_file() {
            return Err(Error::InvalidContainer {
                path: workdir.path().to_path_buf(),
                message: "DOMDocument.xml not found".to_string(),
            });
        }
        let text = fs::read_to_string(&document_path)?;

        let mut library = Library {
            symbols: HashMap::new(),
            folders: Vec::new(),
            folder_paths: HashSet::new(),
            workdir,
            policy,
            skipped: Vec::new(),
        };
        library.parse_document(&text)?;
        log::info!(
            "loaded library: {} symbols, {} folders, {} skipped",
            library.symbols.len(),
            library.folders.len(),
            library.skipped.len()
        );
        Ok(library)
    }

    /// Read the folder list and symbol-reference list from the container
    /// document, in document order.
    fn parse_document(&mut self, text: &str) -> Result<()> {
        let mut reader = Reader::from_str(text);
        let mut in_folders = false;
        let mut in_symbols = false;
        loop {
            let event = reader.read_event()?;
            match &event {
                Event::Start(e) | Event::Empty(e) => {
                    let element = e.local_name();
                    match element.as_ref() {
                        b"folders" => in_folders = true,
                        b"symbols" => in_symbols = true,
                        b"DOMFolderItem" if in_folders => {
                            let attrs = element_attrs(e)?;
                            if let Some(name) = attrs.get("name") {
                                // Third-party unzip tools can mangle the
                                // on-disk folder name.
                                let name = name.to_string();
                                encoding::reconcile(
                                    &self.workdir.path().join("LIBRARY").join(&name),
                                )?;
                                self.ensure_folder(&name);
                            }
                        }
                        b"Include" if in_symbols => {
                            let attrs = element_attrs(e)?;
                            self.load_symbol(attrs)?;
                        }
                        _ => {}
                    }
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"folders" => in_folders = false,
                    b"symbols" => in_symbols = false,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            // `folders`/`symbols` as empty elements never re-enter scope
            if let Event::Empty(e) = &event {
                match e.local_name().as_ref() {
                    b"folders" => in_folders = false,
                    b"symbols" => in_symbols = false,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn load_symbol(&mut self, attrs: AttrBag) -> Result<()> {
        match Symbol::load(attrs, self.workdir.path()) {
            Ok(symbol) => {
                self.symbols
                    .insert(symbol.library_path().to_string(), symbol);
                Ok(())
            }
            Err(Error::MissingBackingFile { href, path }) => match self.policy {
                LoadPolicy::Strict => Err(Error::MissingBackingFile { href, path }),
                LoadPolicy::Lenient => {
                    log::warn!("skipping symbol '{href}': backing file missing");
                    self.skipped.push(href);
                    Ok(())
                }
            },
            Err(other) => Err(other),
        }
    }

    /// The directory this library's extracted files live under
    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    /// The load policy this library was built with
    pub fn policy(&self) -> LoadPolicy {
        self.policy
    }

    /// Folder entries in insertion order
    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    /// Hrefs omitted by the lenient load policy
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Number of symbols in the library
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Check if the library holds no symbols
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Look up a symbol by library path
    pub fn symbol(&self, key: &str) -> Option<&Symbol> {
        self.symbols.get(key)
    }

    /// Check whether a library path is present
    pub fn contains(&self, key: &str) -> bool {
        self.symbols.contains_key(key)
    }

    /// Iterate over symbols in href order
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        let mut sorted: Vec<&Symbol> = self.symbols.values().collect();
        sorted.sort_by(|a, b| a.href().cmp(b.href()));
        sorted.into_iter()
    }

    /// Export a symbol under the given class name (see
    /// [`Symbol::set_linkage`]); the backing file is rewritten eagerly.
    pub fn set_linkage(&mut self, key: &str, class_name: &str) -> Result<()> {
        let symbol = self
            .symbols
            .get_mut(key)
            .ok_or_else(|| Error::UnresolvedSymbolReference {
                name: key.to_string(),
                referenced_from: key.to_string(),
            })?;
        symbol.set_linkage(class_name)
    }

    /// Transitive dependency closure of a symbol, as library paths.
    ///
    /// Cycle-safe: traversal uses a visited set, and a symbol reachable
    /// through a cycle back to the start appears in its own closure. The
    /// result is cached on the symbol until its backing document mutates.
    /// Unresolved references follow the library's [`LoadPolicy`].
    pub fn dependencies_of(&self, key: &str) -> Result<BTreeSet<String>> {
        let root = self
            .symbols
            .get(key)
            .ok_or_else(|| Error::UnresolvedSymbolReference {
                name: key.to_string(),
                referenced_from: key.to_string(),
            })?;
        if let Some(cached) = root.cached_dependencies() {
            return Ok(cached);
        }

        let mut closure = BTreeSet::new();
        let mut visited: HashSet<String> = HashSet::from([key.to_string()]);
        let mut pending = vec![key.to_string()];
        while let Some(current) = pending.pop() {
            let Some(symbol) = self.symbols.get(&current) else {
                continue;
            };
            for instance in symbol.instances()? {
                let dep = instance.library_item;
                if !self.symbols.contains_key(&dep) {
                    match self.policy {
                        LoadPolicy::Strict => {
                            return Err(Error::UnresolvedSymbolReference {
                                name: dep,
                                referenced_from: current,
                            })
                        }
                        LoadPolicy::Lenient => {
                            log::warn!(
                                "symbol '{current}' references unknown library item '{dep}'"
                            );
                            continue;
                        }
                    }
                }
                closure.insert(dep.clone());
                if visited.insert(dep.clone()) {
                    pending.push(dep);
                }
            }
        }

        root.cache_dependencies(closure.clone());
        Ok(closure)
    }

    /// Direct instances of a symbol with their references resolved against
    /// this library's symbol map, under the library's [`LoadPolicy`].
    pub fn instances_of(&self, key: &str) -> Result<Vec<SymbolInstance>> {
        let symbol = self
            .symbols
            .get(key)
            .ok_or_else(|| Error::UnresolvedSymbolReference {
                name: key.to_string(),
                referenced_from: key.to_string(),
            })?;
        let mut resolved = Vec::new();
        for instance in symbol.instances()? {
            if !self.symbols.contains_key(&instance.library_item) {
                match self.policy {
                    LoadPolicy::Strict => {
                        return Err(Error::UnresolvedSymbolReference {
                            name: instance.library_item,
                            referenced_from: key.to_string(),
                        })
                    }
                    LoadPolicy::Lenient => {
                        log::warn!(
                            "symbol '{key}' references unknown library item '{}'",
                            instance.library_item
                        );
                        continue;
                    }
                }
            }
            resolved.push(instance);
        }
        Ok(resolved)
    }

    /// Merge this library with another into a new one.
    ///
    /// Symbol maps are unioned under `policy` (right-biased by default).
    /// Every surviving symbol's backing file is copied into the result's
    /// fresh working directory, never moved, so both inputs stay valid and
    /// independently usable. The folder set is rebuilt from every proper
    /// path prefix of every merged href. Symbol identity (linkage, any
    /// computed dependency closure) is carried across the copy.
    pub fn merge(&self, other: &Library, policy: MergePolicy) -> Result<Library> {
        let chosen = Self::union(&self.symbols, &other.symbols, policy)?;
        let mut result = Library::empty(self.policy)?;
        for symbol in chosen {
            result.adopt(symbol)?;
        }
        result.rebuild_folders();
        log::info!(
            "merged {} + {} symbols into {} ({:?})",
            self.symbols.len(),
            other.symbols.len(),
            result.symbols.len(),
            policy
        );
        Ok(result)
    }

    /// Append another library's symbols into this one, in place, reusing
    /// this library's working directory. Same union, copy, and folder
    /// rebuild rules as [`Library::merge`].
    pub fn append(&mut self, other: &Library, policy: MergePolicy) -> Result<()> {
        for symbol in other.symbols.values() {
            let key = symbol.library_path();
            match policy {
                MergePolicy::KeepLeft if self.symbols.contains_key(key) => continue,
                MergePolicy::RejectOnConflict if self.symbols.contains_key(key) => {
                    return Err(Error::DuplicateSymbolKey {
                        name: key.to_string(),
                    })
                }
                _ => {}
            }
            self.adopt(symbol)?;
        }
        self.rebuild_folders();
        Ok(())
    }

    /// Union two symbol maps under a merge policy, returning surviving
    /// symbols in href order.
    fn union<'a>(
        left: &'a HashMap<String, Symbol>,
        right: &'a HashMap<String, Symbol>,
        policy: MergePolicy,
    ) -> Result<Vec<&'a Symbol>> {
        let mut chosen: HashMap<&'a str, &'a Symbol> = HashMap::new();
        for symbol in left.values() {
            chosen.insert(symbol.library_path(), symbol);
        }
        for symbol in right.values() {
            let key = symbol.library_path();
            match policy {
                MergePolicy::KeepRight => {
                    chosen.insert(key, symbol);
                }
                MergePolicy::KeepLeft => {
                    chosen.entry(key).or_insert(symbol);
                }
                MergePolicy::RejectOnConflict => {
                    if chosen.contains_key(key) {
                        return Err(Error::DuplicateSymbolKey {
                            name: key.to_string(),
                        });
                    }
                    chosen.insert(key, symbol);
                }
            }
        }
        let mut survivors: Vec<&Symbol> = chosen.into_values().collect();
        survivors.sort_by(|a, b| a.href().cmp(b.href()));
        Ok(survivors)
    }

    /// Take a symbol into this library, copying its backing file into this
    /// library's working directory unless it already lives there.
    fn adopt(&mut self, symbol: &Symbol) -> Result<()> {
        let dest = self.workdir.path().join("LIBRARY").join(symbol.href());
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut adopted = symbol.clone();
        if symbol.backing_path() != dest {
            fs::copy(symbol.backing_path(), &dest)?;
            adopted.set_backing_path(dest);
        }
        self.symbols
            .insert(adopted.library_path().to_string(), adopted);
        Ok(())
    }

    /// Recompute the folder set from the current symbols: every proper path
    /// prefix of every href's directory gets an entry, in href order.
    fn rebuild_folders(&mut self) {
        self.folders.clear();
        self.folder_paths.clear();
        let mut hrefs: Vec<String> = self.symbols.values().map(|s| s.href().to_string()).collect();
        hrefs.sort();
        for href in hrefs {
            if let Some((dir, _)) = href.rsplit_once('/') {
                for prefix in path_prefixes(dir) {
                    self.ensure_folder(&prefix);
                }
            }
        }
    }

    fn ensure_folder(&mut self, path: &str) {
        if self.folder_paths.insert(path.to_string()) {
            self.folders.push(Folder::new(path));
        }
    }

    /// Render the folder-list fragment for the container document, in
    /// insertion order.
    pub fn serialize_folders(&self) -> String {
        let tags: Vec<String> = self.folders.iter().map(Folder::to_tag).collect();
        tags.join("\n")
    }

    /// Render the symbol-list fragment for the container document.
    ///
    /// Symbols are serialized in ascending href order. This is a hard
    /// invariant: the authoring tool corrupts or crashes on unsorted
    /// library-item listings.
    pub fn serialize_symbols(&self) -> String {
        let tags: Vec<String> = self.symbols().map(|s| s.reference_tag()).collect();
        tags.join("\n")
    }
}

/// Every proper prefix of a slash-separated directory path:
/// `"a/b/c"` yields `["a", "a/b", "a/b/c"]`.
fn path_prefixes(dir: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut acc = String::new();
    for part in dir.split('/').filter(|p| !p.is_empty()) {
        if !acc.is_empty() {
            acc.push('/');
        }
        acc.push_str(part);
        out.push(acc.clone());
    }
    out
}
