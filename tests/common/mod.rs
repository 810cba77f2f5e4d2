//! Shared test utilities for integration and E2E tests.
//!
//! Builds throwaway `.fla` container archives on disk: a container document
//! listing folders and symbol references, one backing XML file per symbol,
//! compressed with the crate's own archive writer.

use std::fs;
use std::path::Path;

use flamerge::archive;
use tempfile::TempDir;

pub const NS: &str = "http://ns.adobe.com/xfl/2008/";

/// A backing symbol document placing the given library items, one instance
/// each on frame 0.
pub fn backing_doc(name: &str, deps: &[&str]) -> String {
    let placed: String = deps
        .iter()
        .map(|item| format!(r#"<DOMSymbolInstance libraryItemName="{item}" name=""/>"#))
        .collect::<Vec<_>>()
        .join("\n        ");
    format!(
        r#"<DOMSymbolItem xmlns="{NS}" name="{name}" itemID="00000000-00000000">
  <timeline>
    <DOMTimeline name="{name}">
      <layers>
        <DOMLayer name="Layer 1">
          <frames>
            <DOMFrame index="0">
              <elements>
        {placed}
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

/// Declarative builder for a container archive fixture.
#[derive(Default)]
pub struct ContainerFixture {
    folders: Vec<String>,
    symbols: Vec<(String, Vec<String>)>,
}

impl ContainerFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a folder entry to the container document.
    pub fn folder(mut self, path: &str) -> Self {
        self.folders.push(path.to_string());
        self
    }

    /// Add a symbol with the given href, placing the given library items.
    pub fn symbol(mut self, href: &str, deps: &[&str]) -> Self {
        self.symbols
            .push((href.to_string(), deps.iter().map(|d| d.to_string()).collect()));
        self
    }

    /// Write the container tree and compress it into an archive at `target`.
    pub fn write(self, target: &Path) {
        let staging = TempDir::new().unwrap();
        let root = staging.path();
        fs::create_dir_all(root.join("LIBRARY")).unwrap();

        let mut folders_xml = String::new();
        for path in &self.folders {
            fs::create_dir_all(root.join("LIBRARY").join(path)).unwrap();
            folders_xml.push_str(&format!(
                "<DOMFolderItem name=\"{path}\" itemID=\"00000000-00000000\"/>\n"
            ));
        }

        let mut symbols_xml = String::new();
        for (href, deps) in &self.symbols {
            let backing = root.join("LIBRARY").join(href);
            fs::create_dir_all(backing.parent().unwrap()).unwrap();
            let name = href.rsplit('/').next().unwrap().trim_end_matches(".xml");
            let dep_refs: Vec<&str> = deps.iter().map(String::as_str).collect();
            fs::write(backing, backing_doc(name, &dep_refs)).unwrap();
            symbols_xml.push_str(&format!("<Include href=\"{href}\"/>\n"));
        }

        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<DOMDocument xmlns="{NS}" width="760" height="600">
  <folders>
{folders_xml}  </folders>
  <symbols>
{symbols_xml}  </symbols>
</DOMDocument>"#
        );
        fs::write(root.join("DOMDocument.xml"), document).unwrap();
        fs::write(root.join("mimetype"), "application/vnd.adobe.xfl").unwrap();

        archive::compress(root, target).unwrap();
    }
}
