//! Level and range commands
//!
//! These commands parse MLS literals against a policy, print them in
//! canonical form, and compare them.

use anyhow::Result;
use clap::{Args, ValueEnum};
use polscope_policy::{MlsLevel, MlsRange, RangeMatch};
use std::path::PathBuf;

use super::load_policy;

/// Arguments for the level command
#[derive(Args)]
pub struct LevelArgs {
    /// Policy snapshot (TOML, or JSON by extension)
    #[clap(long)]
    pub policy: PathBuf,

    /// Level literal, e.g. s0:c0.c3
    pub level: String,

    /// Second level to compare against
    pub other: Option<String>,
}

/// How the range command compares two ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RangeMode {
    /// Each range contains the other
    Exact,
    /// The first range contains the second
    Sub,
    /// The second range contains the first
    Super,
    /// The ranges share a level
    Intersect,
}

impl RangeMode {
    /// Get the name used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Sub => "sub",
            Self::Super => "super",
            Self::Intersect => "intersect",
        }
    }
}

impl From<RangeMode> for RangeMatch {
    fn from(mode: RangeMode) -> Self {
        match mode {
            RangeMode::Exact => RangeMatch::EXACT,
            RangeMode::Sub => RangeMatch::SUB,
            RangeMode::Super => RangeMatch::SUPER,
            RangeMode::Intersect => RangeMatch::INTERSECT,
        }
    }
}

/// Arguments for the range command
#[derive(Args)]
pub struct RangeArgs {
    /// Policy snapshot (TOML, or JSON by extension)
    #[clap(long)]
    pub policy: PathBuf,

    /// Range literal, e.g. "s0 - s1:c0.c3"
    pub range: String,

    /// Check whether the range contains this one
    #[clap(long)]
    pub contains: Option<String>,

    /// Compare the range with this one
    #[clap(long)]
    pub compare: Option<String>,

    /// Comparison used with --compare
    #[clap(long, value_enum, default_value = "exact")]
    pub mode: RangeMode,

    /// List the levels the range covers
    #[clap(long)]
    pub levels: bool,
}

/// Implementation of the level command
pub fn execute_level(args: &LevelArgs) -> Result<()> {
    let policy = load_policy(&args.policy)?;
    let level = MlsLevel::parse(&policy, &args.level)?;
    let rendered = level.render(&policy)?;

    match &args.other {
        None => {
            if level.validate(&policy)? {
                println!("{}", rendered);
            } else {
                println!("{} (invalid)", rendered);
            }
        }
        Some(other) => {
            let other = MlsLevel::parse(&policy, other)?;
            let outcome = level.compare(Some(&other), &policy)?;
            println!("{} {} {}", rendered, outcome, other.render(&policy)?);
        }
    }
    Ok(())
}

/// Implementation of the range command
pub fn execute_range(args: &RangeArgs) -> Result<()> {
    let policy = load_policy(&args.policy)?;
    let range = MlsRange::parse(&policy, &args.range)?;
    let rendered = range.render(&policy)?;

    if range.validate(&policy)? {
        println!("{}", rendered);
    } else {
        println!("{} (invalid)", rendered);
    }

    if args.levels {
        for level in range.levels(&policy)? {
            println!("  {}", level.render(&policy)?);
        }
    }

    if let Some(sub) = &args.contains {
        let sub = MlsRange::parse(&policy, sub)?;
        let answer = if range.contains_subrange(&sub, &policy)? { "yes" } else { "no" };
        println!("contains {}: {}", sub.render(&policy)?, answer);
    }

    if let Some(other) = &args.compare {
        let other = MlsRange::parse(&policy, other)?;
        let mode = RangeMatch::from(args.mode);
        let answer = range.compare(&other, mode, &policy)?;
        println!("{} {}: {}", args.mode.as_str(), other.render(&policy)?, answer);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_modes_map_to_flags() {
        assert_eq!(RangeMatch::from(RangeMode::Exact), RangeMatch::EXACT);
        assert_eq!(RangeMatch::from(RangeMode::Sub), RangeMatch::SUB);
        assert_eq!(RangeMatch::from(RangeMode::Super), RangeMatch::SUPER);
        assert_eq!(RangeMatch::from(RangeMode::Intersect), RangeMatch::INTERSECT);
    }
}
