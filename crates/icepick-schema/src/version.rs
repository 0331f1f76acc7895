//! Version range matching for `requires` entries.
//!
//! Ranges are written the way `package.json` writes them. Supported forms:
//! - `*`, `latest`, `x` or empty: any version
//! - `1.2.3`: exact version (a bare version is *not* a caret range)
//! - `1.2`, `1`: partial versions (`1.2.x`, `1.x`)
//! - `^1.2.3`, `~1.2.3`, `1.x`, `1.2.*`: caret, tilde and wildcard ranges
//! - `>=1.0.0 <2.0.0`: space-separated comparator sets
//! - `1.2.3 - 2.3.4`: hyphen ranges (inclusive)
//! - `^1.0.0 || ^2.0.0`: alternatives
//!
//! Choosing *which* version to install for a range is the installer's job;
//! this module only answers whether an existing version satisfies it.

use crate::types::Version;
use thiserror::Error;

/// Errors produced while parsing a version range.
#[derive(Error, Debug)]
pub enum RangeError {
    /// One alternative of the range is not a valid comparator set.
    #[error("invalid version range `{range}`: {source}")]
    Invalid {
        /// The full range as written.
        range: String,
        /// The underlying semver parse failure.
        #[source]
        source: semver::Error,
    },

    /// The range contains an empty `||` alternative.
    #[error("invalid version range `{0}`: empty alternative")]
    EmptyAlternative(String),
}

/// A parsed version range, matching if any of its alternatives matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    raw: String,
    /// Empty means "any version".
    alternatives: Vec<semver::VersionReq>,
}

impl VersionRange {
    /// Parse a `package.json` style range.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError`] if any alternative cannot be parsed.
    pub fn parse(raw: &str) -> Result<Self, RangeError> {
        let trimmed = raw.trim();
        if is_any(trimmed) {
            return Ok(Self {
                raw: raw.to_string(),
                alternatives: Vec::new(),
            });
        }

        let mut alternatives = Vec::new();
        for alternative in trimmed.split("||") {
            let alternative = alternative.trim();
            if alternative.is_empty() {
                return Err(RangeError::EmptyAlternative(raw.to_string()));
            }
            if is_any(alternative) {
                alternatives.clear();
                break;
            }
            let normalized = normalize(alternative);
            let req =
                semver::VersionReq::parse(&normalized).map_err(|source| RangeError::Invalid {
                    range: raw.to_string(),
                    source,
                })?;
            alternatives.push(req);
        }

        Ok(Self {
            raw: raw.to_string(),
            alternatives,
        })
    }

    /// The range as originally written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns `true` if the range accepts every version.
    pub fn is_any(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// Check whether a concrete version satisfies the range.
    ///
    /// Versions that are not valid semver only satisfy "any" ranges or a
    /// range written as exactly the same string.
    pub fn matches(&self, version: &Version) -> bool {
        if self.is_any() {
            return true;
        }
        match version.semver() {
            Ok(v) => self.alternatives.iter().any(|req| req.matches(&v)),
            Err(_) => self.raw.trim() == version.as_str(),
        }
    }
}

impl std::fmt::Display for VersionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

fn is_any(s: &str) -> bool {
    matches!(s, "" | "*" | "latest" | "x" | "X")
}

/// Rewrite one `||` alternative into the comma-separated form `semver` expects.
fn normalize(alternative: &str) -> String {
    if let Some((low, high)) = alternative.split_once(" - ") {
        return format!(
            ">={}, <={}",
            strip_v(low.trim()),
            strip_v(high.trim())
        );
    }

    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in alternative.split_whitespace() {
        if token.chars().all(|c| "<>=~^".contains(c)) {
            pending_op = Some(token);
            continue;
        }
        let comparator = match pending_op.take() {
            Some(op) => format!("{op}{}", strip_v(token)),
            None => bare_to_exact(token),
        };
        comparators.push(comparator);
    }
    if let Some(op) = pending_op {
        // Dangling operator: hand it to semver so the error names it.
        comparators.push(op.to_string());
    }
    comparators.join(", ")
}

/// A bare version means "exactly this" (or this prefix) rather than caret.
fn bare_to_exact(token: &str) -> String {
    let token = strip_v(token);
    let starts_with_digit = token.chars().next().is_some_and(|c| c.is_ascii_digit());
    let has_wildcard = token.contains(['x', 'X', '*']);
    if starts_with_digit && !has_wildcard {
        format!("={token}")
    } else {
        token.to_string()
    }
}

fn strip_v(token: &str) -> &str {
    token.strip_prefix('v').unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn satisfies(version: &str, range: &str) -> bool {
        VersionRange::parse(range)
            .unwrap()
            .matches(&Version::new(version))
    }

    #[test]
    fn caret_ranges() {
        assert!(satisfies("18.2.0", "^18.0.0"));
        assert!(!satisfies("18.2.0", "^17.0.0"));
        assert!(!satisfies("0.27.0", "^0.26"));
    }

    #[test]
    fn bare_versions_are_exact() {
        assert!(satisfies("1.2.3", "1.2.3"));
        assert!(!satisfies("1.2.4", "1.2.3"));
        assert!(satisfies("1.2.9", "1.2"));
        assert!(!satisfies("1.3.0", "1.2"));
    }

    #[test]
    fn comparator_sets_and_hyphens() {
        assert!(satisfies("1.5.0", ">=1.0.0 <2.0.0"));
        assert!(!satisfies("2.0.0", ">=1.0.0 <2.0.0"));
        assert!(satisfies("1.5.0", ">= 1.0.0 < 2.0.0"));
        assert!(satisfies("2.3.4", "1.2.3 - 2.3.4"));
        assert!(!satisfies("2.3.5", "1.2.3 - 2.3.4"));
    }

    #[test]
    fn alternatives_and_wildcards() {
        assert!(satisfies("2.1.0", "^1.0.0 || ^2.0.0"));
        assert!(!satisfies("3.0.0", "^1.0.0 || ^2.0.0"));
        assert!(satisfies("4.17.21", "4.x"));
        assert!(satisfies("9.9.9", "*"));
        assert!(satisfies("whatever", "latest"));
    }

    #[test]
    fn invalid_ranges_are_errors() {
        assert!(VersionRange::parse("not a range").is_err());
        assert!(VersionRange::parse("^1.0.0 ||").is_err());
        assert!(VersionRange::parse(">=").is_err());
    }
}
