//! Info command implementation
//!
//! Prints a container's folder tree, symbol listing, and linkage exports.
//! With `--deps`, also prints the transitive dependency closure of one
//! symbol.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use flamerge::container::Container;
use flamerge::library::LoadPolicy;

/// Arguments for the info command
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Container file to inspect
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Print the transitive dependency closure of one symbol (library path)
    #[arg(long, value_name = "SYMBOL")]
    pub deps: Option<String>,

    /// Fail on missing backing files instead of skipping those symbols
    #[arg(long)]
    pub strict: bool,
}

/// Execute the info command
pub fn execute(args: InfoArgs) -> Result<()> {
    let policy = if args.strict {
        LoadPolicy::Strict
    } else {
        LoadPolicy::Lenient
    };
    let container = Container::open(&args.input, policy)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let library = container.library();

    println!(
        "{}: {} symbols, {} folders",
        container.metadata().name,
        library.len(),
        library.folders().len()
    );

    if !library.folders().is_empty() {
        println!("\nfolders:");
        for folder in library.folders() {
            println!("  {}  [{}]", folder.path, folder.item_id);
        }
    }

    if !library.is_empty() {
        println!("\nsymbols:");
        for symbol in library.symbols() {
            match symbol.linkage() {
                Some(class) => println!("  {}  (exported as {})", symbol.href(), class),
                None => println!("  {}", symbol.href()),
            }
        }
    }

    if !library.skipped().is_empty() {
        println!("\nskipped (missing backing files):");
        for href in library.skipped() {
            println!("  {href}");
        }
    }

    if let Some(key) = &args.deps {
        let closure = library
            .dependencies_of(key)
            .with_context(|| format!("failed to resolve dependencies of '{key}'"))?;
        println!("\ndependencies of {key}:");
        for dep in &closure {
            println!("  {dep}");
        }
    }
    Ok(())
}
