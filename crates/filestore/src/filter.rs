//! Include/exclude filtering applied during traversal.

use glob::{Pattern, PatternError};

/// Glob-based filter over entry names.
///
/// Excludes always win. Includes constrain files only: a directory is
/// still traversed when includes are set, so `*.txt` finds matches in
/// subdirectories too.
#[derive(Debug, Default)]
pub struct PathFilter {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl PathFilter {
    pub fn new(includes: &[String], excludes: &[String]) -> Result<Self, PatternError> {
        Ok(Self {
            includes: compile(includes)?,
            excludes: compile(excludes)?,
        })
    }

    /// True when a file with this name should be indexed.
    pub fn accepts_file(&self, name: &str) -> bool {
        if self.excludes.iter().any(|pattern| pattern.matches(name)) {
            return false;
        }
        if self.includes.is_empty() {
            return true;
        }
        self.includes.iter().any(|pattern| pattern.matches(name))
    }

    /// True when traversal should descend into a directory with this name.
    pub fn descends_into(&self, name: &str) -> bool {
        !self.excludes.iter().any(|pattern| pattern.matches(name))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, PatternError> {
    patterns.iter().map(|raw| Pattern::new(raw)).collect()
}
