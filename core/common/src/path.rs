//! Slash-delimited node paths.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Absolute path of a node in the remote namespace, e.g. `/a/b/c`.
///
/// The root `/` has no components. Every other path is a non-empty list of
/// segments; segments are never empty, never `.` or `..`, and never contain
/// control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath {
    components: Vec<String>,
}

impl NodePath {
    /// The root path `/`.
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Parse an absolute path.
    ///
    /// # Errors
    /// - `BadArguments` if the path does not start with `/`, ends with `/`
    ///   (other than the root itself) or holds an invalid segment
    pub fn parse(path: &str) -> Result<Self> {
        if path == "/" {
            return Ok(Self::root());
        }
        let Some(rest) = path.strip_prefix('/') else {
            return Err(Error::BadArguments(format!(
                "Path must start with '/': {:?}",
                path
            )));
        };
        if rest.ends_with('/') {
            return Err(Error::BadArguments(format!(
                "Path must not end with '/': {:?}",
                path
            )));
        }

        let components = rest
            .split('/')
            .map(|segment| validate_segment(segment).map(|_| segment.to_string()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { components })
    }

    /// Parse a path typed relative to the root; the leading `/` is optional.
    pub fn parse_relative(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(Error::BadArguments("Path cannot be empty".to_string()));
        }
        if path.starts_with('/') {
            Self::parse(path)
        } else {
            Self::parse(&format!("/{}", path))
        }
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Parent path, `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let mut components = self.components.clone();
        components.pop();
        Some(Self { components })
    }

    /// Last segment, `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.components.last().map(|s| s.as_str())
    }

    /// Path of the child named `child`.
    ///
    /// # Errors
    /// - `BadArguments` if `child` is not a valid single segment
    pub fn join(&self, child: &str) -> Result<Self> {
        validate_segment(child)?;
        let mut components = self.components.clone();
        components.push(child.to_string());
        Ok(Self { components })
    }

    /// Path segments, empty for the root.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Number of segments below the root.
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// Proper ancestors below the root, outermost first.
    ///
    /// For `/a/b/c` this yields `/a` then `/a/b`.
    pub fn ancestors(&self) -> impl Iterator<Item = NodePath> + '_ {
        (1..self.components.len()).map(move |len| Self {
            components: self.components[..len].to_vec(),
        })
    }

    /// Whether `self` lies strictly below `other`.
    pub fn is_descendant_of(&self, other: &NodePath) -> bool {
        self.components.len() > other.components.len()
            && self.components.starts_with(&other.components)
    }

    /// String form, `/` for the root.
    pub fn as_string(&self) -> String {
        if self.is_root() {
            "/".to_string()
        } else {
            format!("/{}", self.components.join("/"))
        }
    }
}

fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(Error::BadArguments(
            "Path segment cannot be empty".to_string(),
        ));
    }
    if segment == "." || segment == ".." {
        return Err(Error::BadArguments(format!(
            "Relative segment not allowed: {:?}",
            segment
        )));
    }
    if segment.contains('/') {
        return Err(Error::BadArguments(format!(
            "Segment cannot contain '/': {:?}",
            segment
        )));
    }
    if segment.chars().any(char::is_control) {
        return Err(Error::BadArguments(format!(
            "Segment contains control characters: {:?}",
            segment
        )));
    }
    Ok(())
}

/// Whether `path` is a valid absolute path.
pub fn is_valid_path(path: &str) -> bool {
    NodePath::parse(path).is_ok()
}

/// Whether `path` is valid once a leading `/` is implied.
pub fn is_valid_sub_path(path: &str) -> bool {
    NodePath::parse_relative(path).is_ok()
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl TryFrom<String> for NodePath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for NodePath {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.as_string()
    }
}

impl std::str::FromStr for NodePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_root() {
        let root = NodePath::root();
        assert!(root.is_root());
        assert_eq!(root.to_string(), "/");
        assert!(root.parent().is_none());
        assert!(root.name().is_none());
        assert_eq!(NodePath::parse("/").unwrap(), root);
    }

    #[test]
    fn test_parent() {
        assert_eq!(NodePath::parse("/c").unwrap().parent().unwrap(), NodePath::root());
        assert_eq!(
            NodePath::parse("/p/c").unwrap().parent().unwrap().to_string(),
            "/p"
        );
        assert_eq!(
            NodePath::parse("/g/p/c").unwrap().parent().unwrap().to_string(),
            "/g/p"
        );
    }

    #[test]
    fn test_join_under_root_has_single_slash() {
        let path = NodePath::root().join("zookeeper").unwrap();
        assert_eq!(path.to_string(), "/zookeeper");
        assert_eq!(path.join("quota").unwrap().to_string(), "/zookeeper/quota");
    }

    #[test]
    fn test_rejects_malformed_paths() {
        for bad in ["", "a", "/a/", "//", "/a//b", "/a/./b", "/a/../b", "/a\u{0}b"] {
            let err = NodePath::parse(bad).unwrap_err();
            assert!(matches!(err, Error::BadArguments(_)), "{:?} accepted", bad);
        }
    }

    #[test]
    fn test_join_rejects_bad_child() {
        let base = NodePath::parse("/p").unwrap();
        assert!(matches!(base.join(""), Err(Error::BadArguments(_))));
        assert!(matches!(base.join("a/b"), Err(Error::BadArguments(_))));
        assert!(matches!(base.join(".."), Err(Error::BadArguments(_))));
    }

    #[test]
    fn test_relative_parse() {
        assert_eq!(NodePath::parse_relative("a/b").unwrap().to_string(), "/a/b");
        assert_eq!(NodePath::parse_relative("/a/b").unwrap().to_string(), "/a/b");
        assert!(is_valid_sub_path("a"));
        assert!(!is_valid_path("a"));
        assert!(!is_valid_sub_path(""));
        assert!(!is_valid_sub_path("a/"));
    }

    #[test]
    fn test_ancestors_top_down() {
        let path = NodePath::parse("/a/b/c").unwrap();
        let ancestors: Vec<String> = path.ancestors().map(|p| p.to_string()).collect();
        assert_eq!(ancestors, vec!["/a", "/a/b"]);
        assert_eq!(NodePath::root().ancestors().count(), 0);
    }

    #[test]
    fn test_descendant() {
        let a = NodePath::parse("/a").unwrap();
        let ab = NodePath::parse("/a/b").unwrap();
        let abc = NodePath::parse("/abc").unwrap();
        assert!(ab.is_descendant_of(&a));
        assert!(a.is_descendant_of(&NodePath::root()));
        assert!(!a.is_descendant_of(&a));
        assert!(!abc.is_descendant_of(&a));
    }

    #[test]
    fn test_serde_as_string() {
        let path = NodePath::parse("/a/b").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"/a/b\"");
        let back: NodePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
        assert!(serde_json::from_str::<NodePath>("\"a/b\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_joined_child_has_parent(
            segments in prop::collection::vec("[a-z0-9_-]{1,8}", 0..6),
            child in "[a-z0-9_-]{1,8}",
        ) {
            let mut path = NodePath::root();
            for segment in &segments {
                path = path.join(segment).unwrap();
            }
            let joined = path.join(&child).unwrap();
            prop_assert_eq!(joined.parent().unwrap(), path.clone());
            prop_assert_eq!(joined.name(), Some(child.as_str()));
            prop_assert_eq!(joined.depth(), segments.len() + 1);
            prop_assert_eq!(NodePath::parse(&joined.to_string()).unwrap(), joined);
        }
    }
}
