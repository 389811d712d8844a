// ABOUTME: Version info, execution ceilings, and filesystem sandbox settings

use std::path::PathBuf;

pub const VERSION: &str = "1.0.0";

/// Default call-stack ceiling: converts runaway recursion into E408.
pub const DEFAULT_RECURSION_LIMIT: usize = 1000;

/// Default total-iteration ceiling across all loops: converts a stuck
/// `repeat while` into E410. Adjustable from Steps code with
/// `set iteration limit to N`.
pub const DEFAULT_ITERATION_LIMIT: u64 = 10_000_000;

/// Filesystem sandbox configuration for the file and CSV natives.
#[derive(Debug, Clone)]
pub struct FsConfig {
    /// Directory the file natives are rooted at, normally the project root.
    pub root: PathBuf,
    pub max_file_size: usize,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            // Default max file size: 10MB
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

/// Execution limits, adjustable per run from the CLI.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub recursion: usize,
    pub iterations: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            recursion: DEFAULT_RECURSION_LIMIT,
            iterations: DEFAULT_ITERATION_LIMIT,
        }
    }
}
