//! # Container Facade
//!
//! A [`Container`] is one authoring-tool project file: the zip archive, its
//! top-level metadata, and the [`Library`] modeled from its document tree.
//! This is the entry point batch callers use:
//!
//! ```no_run
//! use flamerge::container::Container;
//! use flamerge::library::{LoadPolicy, MergePolicy};
//!
//! # fn main() -> flamerge::error::Result<()> {
//! let first = Container::open("Element1.fla".as_ref(), LoadPolicy::default())?;
//! let second = Container::open("Element2.fla".as_ref(), LoadPolicy::default())?;
//! let mut merged = first.merge(&second, MergePolicy::default())?;
//! merged.save("Merged.fla".as_ref())?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use tempfile::TempDir;

use crate::archive;
use crate::assembler::{self, Metadata};
use crate::error::{Error, Result};
use crate::library::{Library, LoadPolicy, MergePolicy};

/// One authoring-tool project file with its in-memory library model.
#[derive(Debug)]
pub struct Container {
    metadata: Metadata,
    library: Library,
}

impl Container {
    /// Open a container archive: extract it into a fresh private working
    /// directory and load the library from the document tree.
    ///
    /// A file that is not a zip archive or lacks the top-level document
    /// yields [`Error::Archive`] or [`Error::InvalidContainer`]; the caller
    /// decides whether to skip that input or abort the batch.
    pub fn open(path: &Path, policy: LoadPolicy) -> Result<Container> {
        let workdir = TempDir::new()?;
        archive::extract(path, workdir.path())?;
        if !workdir.path().join("DOMDocument.xml").is_file() {
            return Err(Error::InvalidContainer {
                path: path.to_path_buf(),
                message: "archive does not contain DOMDocument.xml".to_string(),
            });
        }
        let library = Library::load_extracted(workdir, policy)?;
        let metadata = Metadata {
            name: file_stem(path),
            ..Metadata::default()
        };
        log::info!(
            "opened container '{}' with {} symbols",
            metadata.name,
            library.len()
        );
        Ok(Container { metadata, library })
    }

    /// Wrap an existing library with fresh metadata.
    pub fn from_library(library: Library) -> Container {
        Container {
            metadata: Metadata::default(),
            library,
        }
    }

    /// Container metadata (name, dimensions, mime type)
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Mutable container metadata, for dimension or name overrides
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// The container's library model
    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Mutable access to the library, e.g. for linkage exports
    pub fn library_mut(&mut self) -> &mut Library {
        &mut self.library
    }

    /// Merge this container's library with another's into a new container.
    ///
    /// Both inputs stay valid and independently usable afterwards; the
    /// result owns a fresh working directory with copies of every backing
    /// file. The result inherits this container's metadata.
    pub fn merge(&self, other: &Container, policy: MergePolicy) -> Result<Container> {
        let library = self.library.merge(&other.library, policy)?;
        Ok(Container {
            metadata: self.metadata.clone(),
            library,
        })
    }

    /// Append another container's symbols into this one, in place.
    pub fn append(&mut self, other: &Container, policy: MergePolicy) -> Result<()> {
        self.library.append(&other.library, policy)
    }

    /// Assemble the container files and compress the working directory into
    /// an archive at `path`. The container is renamed to the target's file
    /// stem first, so the marker file and publish names stay consistent.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.metadata.name = file_stem(path);
        assembler::assemble(&self.library, &self.metadata)?;
        archive::compress(self.library.workdir(), path)?;
        log::info!(
            "saved container '{}' ({} symbols) to {}",
            self.metadata.name,
            self.library.len(),
            path.display()
        );
        Ok(())
    }
}

/// Filename minus the final extension, used as the container name.
fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Empty".to_string())
}
