//! # flamerge
//!
//! This library merges Flash CS5 authoring containers (`.fla` files): zip
//! archives holding a namespaced XML document that describes a library of
//! named symbols, each symbol backed by its own XML file under `LIBRARY/`.
//! Containers are loaded into an in-memory model, their symbol libraries are
//! merged under an explicit conflict policy, and a valid container is
//! re-emitted that the authoring tool can open without data loss.
//!
//! ## Quick Example
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
//!
//! ## Core Concepts
//!
//! - **Container (`container`)**: one project file, covering the archive, its
//!   metadata, and the library modeled from its document tree.
//! - **Library (`library`)**: the folder hierarchy and symbol set, with the
//!   dependency resolver and the merge engine. This is where the invariants
//!   live: href uniqueness, folder completeness, deterministic ordering.
//! - **Symbol (`symbol`)**: one library item wrapping its backing XML
//!   document; exposes identity, linkage, and instance scans.
//! - **Assembly (`assembler`)**: splices the library back into the container
//!   document templates and lays out the working directory.
//! - **Collaborators (`archive`, `encoding`)**: zip extraction/compression
//!   and filename-encoding repair at the boundary.
//!
//! ## Execution Flow
//!
//! 1. **Extract**: unpack each input archive into a private scratch
//!    directory.
//! 2. **Load**: build the library from the container document, folder and
//!    symbol entries in document order, under a [`library::LoadPolicy`].
//! 3. **Merge**: union symbol maps under a [`library::MergePolicy`], copy
//!    backing files into a fresh working directory, rebuild the folder tree.
//! 4. **Assemble**: render the document and publish-settings templates,
//!    write the mimetype and marker files.
//! 5. **Compress**: pack the working directory back into a `.fla` archive.

pub mod archive;
pub mod assembler;
pub mod attrs;
pub mod container;
pub mod encoding;
pub mod error;
pub mod ident;
pub mod library;
pub mod symbol;
