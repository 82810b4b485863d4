//! Fixture storage for the AMPL compiler test suites
//!
//! This crate knows where things live in a compiler project checkout
//! (sources, stage drivers, fixture programs, expected outputs) and can
//! bulk-generate random AMPL programs for scanner fuzzing.

pub mod generate;
pub mod layout;

use std::path::PathBuf;
use thiserror::Error;

pub use generate::{write_fixtures, ProgramGenerator, OPERATORS, RESERVED_WORDS};
pub use layout::{list_fixtures, Module, ProjectLayout, Stream};

/// Errors related to fixture storage
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Invalid module name '{name}': expected lowercase letters and digits only")]
    InvalidModule { name: String },

    #[error("Fixture already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("Invalid fixture range {start}..{end}")]
    InvalidRange { start: u32, end: u32 },

    #[error("Glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FixtureResult<T> = Result<T, FixtureError>;
