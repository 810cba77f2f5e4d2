//! Merge command implementation
//!
//! Opens each input container in order, folds them into a single library
//! (left to right, so under the default right-biased policy the last input
//! wins name collisions), and writes the merged container to the output
//! path.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use flamerge::container::Container;
use flamerge::library::{LoadPolicy, MergePolicy};

/// Conflict handling for symbols sharing a name across inputs
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ConflictArg {
    /// The earlier input's symbol survives
    KeepLeft,
    /// The later input's symbol survives (historical behavior)
    #[default]
    KeepRight,
    /// Fail the merge on any collision
    Reject,
}

impl From<ConflictArg> for MergePolicy {
    fn from(arg: ConflictArg) -> MergePolicy {
        match arg {
            ConflictArg::KeepLeft => MergePolicy::KeepLeft,
            ConflictArg::KeepRight => MergePolicy::KeepRight,
            ConflictArg::Reject => MergePolicy::RejectOnConflict,
        }
    }
}

/// Arguments for the merge command
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Input container files, merged left to right
    #[arg(required = true, num_args = 2.., value_name = "FILE")]
    pub inputs: Vec<PathBuf>,

    /// Output container file
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// How to resolve symbol-name collisions
    #[arg(long, value_enum, default_value_t = ConflictArg::KeepRight)]
    pub on_conflict: ConflictArg,

    /// Fail on missing backing files instead of skipping those symbols
    #[arg(long)]
    pub strict: bool,

    /// Stage width override
    #[arg(long, value_name = "PX")]
    pub width: Option<u32>,

    /// Stage height override
    #[arg(long, value_name = "PX")]
    pub height: Option<u32>,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the merge command
pub fn execute(args: MergeArgs) -> Result<()> {
    let load_policy = if args.strict {
        LoadPolicy::Strict
    } else {
        LoadPolicy::Lenient
    };
    let merge_policy: MergePolicy = args.on_conflict.into();

    let (first, rest) = args
        .inputs
        .split_first()
        .context("at least two input containers are required")?;
    let mut merged = Container::open(first, load_policy)
        .with_context(|| format!("failed to open {}", first.display()))?;
    report_skips(&merged, first, args.quiet);

    for path in rest {
        let next = Container::open(path, load_policy)
            .with_context(|| format!("failed to open {}", path.display()))?;
        report_skips(&next, path, args.quiet);
        merged = merged
            .merge(&next, merge_policy)
            .with_context(|| format!("failed to merge {}", path.display()))?;
    }

    if let Some(width) = args.width {
        merged.metadata_mut().width = width;
    }
    if let Some(height) = args.height {
        merged.metadata_mut().height = height;
    }

    merged
        .save(&args.output)
        .with_context(|| format!("failed to save {}", args.output.display()))?;

    if !args.quiet {
        println!(
            "merged {} containers into {} ({} symbols, {} folders)",
            args.inputs.len(),
            args.output.display(),
            merged.library().len(),
            merged.library().folders().len()
        );
    }
    Ok(())
}

fn report_skips(container: &Container, path: &std::path::Path, quiet: bool) {
    if quiet {
        return;
    }
    for href in container.library().skipped() {
        eprintln!(
            "warning: {} references '{}' but its backing file is missing; symbol skipped",
            path.display(),
            href
        );
    }
}
