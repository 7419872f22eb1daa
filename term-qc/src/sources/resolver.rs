//! Wildcard input path resolution.

use crate::core::WILDCARD;
use crate::error::{Result, TermError};
use regex::Regex;
use std::fmt::Debug;
use std::path::PathBuf;

/// Expands a wildcard path into the concrete paths it denotes.
///
/// Implementations must be deterministic for a fixed filesystem state and
/// return paths in a stable order.
pub trait PathResolver: Debug + Send + Sync {
    fn resolve(&self, pattern: &str) -> Result<Vec<PathBuf>>;
}

/// Resolves wildcards against the local filesystem.
///
/// The wildcard stands for a numeric suffix such as a batch or month number:
/// `cohort_*.csv` matches `cohort_1.csv` and `cohort_202` but not
/// `cohort_old.csv`. Matches are sorted lexicographically.
#[derive(Debug, Clone)]
pub struct GlobResolver {
    max_digits: usize,
}

impl Default for GlobResolver {
    fn default() -> Self {
        Self { max_digits: 4 }
    }
}

impl GlobResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many digits the wildcard may stand for.
    pub fn with_max_digits(mut self, max_digits: usize) -> Self {
        self.max_digits = max_digits.max(1);
        self
    }

    /// The anchored regex the wildcard pattern translates to.
    pub fn pattern_regex(&self, pattern: &str) -> Result<Regex> {
        let digits = format!(r"\d{{1,{}}}", self.max_digits);
        let body = normalize(pattern)
            .split(WILDCARD)
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(&digits);
        Regex::new(&format!("^{body}$"))
            .map_err(|e| TermError::Parse(format!("invalid input pattern '{pattern}': {e}")))
    }
}

impl PathResolver for GlobResolver {
    fn resolve(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        if !pattern.contains(WILDCARD) {
            return Ok(vec![PathBuf::from(pattern)]);
        }

        let matcher = self.pattern_regex(pattern)?;
        let candidates = glob::glob(pattern)
            .map_err(|e| TermError::Parse(format!("invalid input pattern '{pattern}': {e}")))?;

        let mut paths = Vec::new();
        for candidate in candidates {
            let path = candidate.map_err(|e| {
                let path = e.path().to_path_buf();
                TermError::resource_with_source(path, "could not list", Box::new(e.into_error()))
            })?;
            if matcher.is_match(normalize(&path.to_string_lossy())) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

fn normalize(path: &str) -> &str {
    path.strip_prefix("./").unwrap_or(path)
}
