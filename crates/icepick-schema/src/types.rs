//! Package identity newtypes.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// An npm-style package name used as an import specifier (e.g. `react`, `@scope/pkg`).
///
/// Unlike file names, import specifiers are case-sensitive, so the name is
/// stored exactly as declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageName(String);

impl PackageName {
    /// Create a new package name from the given string (stored as-is).
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Return the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the name can be used as a bare import specifier.
    ///
    /// Rejects empty names, names containing whitespace or backslashes,
    /// relative or absolute paths, and `.`/`..` or empty segments.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && !self.0.chars().any(|c| c.is_whitespace() || c == '\\')
            && !self.0.starts_with('.')
            && self
                .0
                .split('/')
                .all(|part| !part.is_empty() && part != "." && part != "..")
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

impl std::ops::Deref for PackageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<std::path::Path> for PackageName {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

impl PartialEq<str> for PackageName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A concrete version string as found in a package descriptor (e.g. `18.2.0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.semver(), other.semver()) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            (Ok(_), Err(_)) => std::cmp::Ordering::Less,
            (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
            (Err(_), Err(_)) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Version {
    /// Create a new version from the given string (stored as-is).
    pub fn new(v: &str) -> Self {
        Self(v.to_string())
    }

    /// Return the version string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the version as semver, tolerating a leading `v`.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`semver::Error`] if the string is not a valid
    /// semantic version.
    pub fn semver(&self) -> Result<semver::Version, semver::Error> {
        semver::Version::parse(self.0.trim().trim_start_matches('v'))
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

impl std::ops::Deref for Version {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for Version {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Version {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_names_are_valid() {
        assert!(PackageName::new("@scope/pkg").is_valid());
        assert!(PackageName::new("react-dom").is_valid());
        assert!(!PackageName::new("").is_valid());
        assert!(!PackageName::new("./local").is_valid());
        assert!(!PackageName::new("has space").is_valid());
        assert!(!PackageName::new("/abs").is_valid());
        assert!(!PackageName::new("@scope/../../etc").is_valid());
        assert!(!PackageName::new("@scope//pkg").is_valid());
    }

    #[test]
    fn names_keep_their_case() {
        let name = PackageName::new("LeftPad");
        assert_eq!(name.as_str(), "LeftPad");
        assert_ne!(name, "leftpad");
    }

    #[test]
    fn version_ordering_uses_semver() {
        assert!(Version::new("1.10.0") > Version::new("1.9.0"));
        assert!(Version::new("2.0.0-beta.1") < Version::new("2.0.0"));
        assert!(Version::new("v1.2.3").semver().is_ok());
    }
}
