//! Container assembly: template substitution and working-directory layout
//!
//! Turning a library back into an openable container is deliberately dumb:
//! the two boilerplate documents are templates with literal `{{ key }}`
//! placeholders, and the folder/symbol XML fragments produced by the library
//! are spliced in as-is. The resulting layout, written into the library's
//! working directory before archiving:
//!
//! ```text
//! <root>/mimetype              literal MIME string, no trailing newline
//! <root>/DOMDocument.xml       folder + symbol lists spliced into template
//! <root>/PublishSettings.xml   publish settings with metadata substituted
//! <root>/<name>.xfl            fixed marker identifying the produced variant
//! <root>/LIBRARY/<href>.xml    one file per symbol (already in place)
//! ```

use std::fs;

use crate::error::Result;
use crate::library::Library;

/// Document skeleton the folder and symbol fragments are spliced into.
pub const DOM_DOCUMENT_TEMPLATE: &str = include_str!("../templates/DOMDocument.xml");
/// Publish-settings skeleton metadata is substituted into.
pub const PUBLISH_SETTINGS_TEMPLATE: &str = include_str!("../templates/PublishSettings.xml");
/// Marker content of the `<name>.xfl` file.
pub const XFL_MARKER: &str = "PROXY-CS5";

/// Top-level container metadata substituted into the templates.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub mimetype: String,
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata {
            name: "Empty".to_string(),
            width: 760,
            height: 600,
            mimetype: "application/vnd.adobe.xfl".to_string(),
        }
    }
}

/// Replace every `{{ key }}` placeholder with its value, literally.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in values {
        out = out.replace(&format!("{{{{ {key} }}}}"), value);
    }
    out
}

/// Write the container-level files into the library's working directory.
///
/// The symbol backing files already live under `LIBRARY/`; this adds the
/// document, the publish settings, the mimetype, and the marker file, after
/// which the directory is ready for the archive writer.
pub fn assemble(library: &Library, metadata: &Metadata) -> Result<()> {
    let root = library.workdir();
    let width = metadata.width.to_string();
    let height = metadata.height.to_string();

    let document = render(
        DOM_DOCUMENT_TEMPLATE,
        &[
            ("folders_xml", &library.serialize_folders()),
            ("symbols_xml", &library.serialize_symbols()),
            ("width", &width),
            ("height", &height),
            ("name", &metadata.name),
        ],
    );
    let settings = render(
        PUBLISH_SETTINGS_TEMPLATE,
        &[
            ("name", &metadata.name),
            ("width", &width),
            ("height", &height),
        ],
    );

    fs::write(root.join("mimetype"), &metadata.mimetype)?;
    fs::write(root.join("DOMDocument.xml"), document)?;
    fs::write(root.join("PublishSettings.xml"), settings)?;
    fs::write(root.join(format!("{}.xfl", metadata.name)), XFL_MARKER)?;
    log::debug!("assembled container '{}' at {}", metadata.name, root.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::LoadPolicy;

    #[test]
    fn test_render_replaces_placeholders() {
        let out = render("w={{ width }} h={{ height }}", &[("width", "760"), ("height", "600")]);
        assert_eq!(out, "w=760 h=600");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let out = render("{{ mystery }}", &[("width", "760")]);
        assert_eq!(out, "{{ mystery }}");
    }

    #[test]
    fn test_render_replaces_repeated_placeholders() {
        let out = render("{{ name }}.swf {{ name }}.html", &[("name", "Merged")]);
        assert_eq!(out, "Merged.swf Merged.html");
    }

    #[test]
    fn test_assemble_writes_container_layout() {
        let library = Library::empty(LoadPolicy::default()).unwrap();
        let metadata = Metadata {
            name: "Fixture".to_string(),
            ..Metadata::default()
        };
        assemble(&library, &metadata).unwrap();

        let root = library.workdir();
        let mimetype = fs::read_to_string(root.join("mimetype")).unwrap();
        assert_eq!(mimetype, "application/vnd.adobe.xfl");
        assert!(!mimetype.ends_with('\n'));

        let document = fs::read_to_string(root.join("DOMDocument.xml")).unwrap();
        assert!(document.contains(r#"width="760""#));
        assert!(document.contains(r#"height="600""#));
        assert!(!document.contains("{{"));

        let settings = fs::read_to_string(root.join("PublishSettings.xml")).unwrap();
        assert!(settings.contains("<flashFileName>Fixture.swf</flashFileName>"));

        let marker = fs::read_to_string(root.join("Fixture.xfl")).unwrap();
        assert_eq!(marker, XFL_MARKER);
    }
}
