//! dirsort - sort a directory tree into category folders
//!
//! The library walks a source tree on a bounded worker pool, classifies
//! every file by extension, and places it in a category folder under an
//! output root with a transliterated, normalized name. Archives are
//! unpacked into their own folder, a flat by-extension mirror of the source
//! can be written alongside, and source directories left empty are removed.
//! Behaviour is configured through TOML files (see [`config`]).

pub mod archive;
pub mod cleaner;
pub mod cli;
pub mod config;
pub mod file_category;
pub mod file_organizer;
pub mod logging;
pub mod mirror;
pub mod normalize;
pub mod organizer;
pub mod output;
pub mod scanner;

pub use config::{CompiledFilters, ConfigError, SortConfig};
pub use file_category::{Category, ClassificationRegistry};
pub use file_organizer::{CategoryRouter, FileOrganizer, OrganizeError, TransferMode};
pub use normalize::normalize;
pub use organizer::{Organizer, Phase, RunReport};
pub use scanner::{DiscoverySet, TreeWalker};

pub use cli::{Cli, run_cli};
