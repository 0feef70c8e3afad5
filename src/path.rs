// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor path
//!
//! The `path` module provides the `ActorPath` type. An `ActorPath` is the
//! canonical address of an actor inside a running system: a forward-slash
//! separated sequence of segments anchored at the `/system` prefix.
//!

use serde::{Deserialize, Serialize};

use uuid::Uuid;

use std::cmp::Ordering;
use std::fmt::{Error, Formatter};

/// Root segment under which every canonical address lives.
pub const SYSTEM_ROOT: &str = "system";

/// Hierarchical actor address providing unique identification within a system.
///
/// `ActorPath` represents the location of an actor in the address tree,
/// similar to a filesystem path. Addresses are the sole identifier of an
/// actor: the registry maps each canonical path to at most one live record,
/// and the arbiter routes envelopes by exact path lookup.
///
/// # Structure
///
/// Paths are sequences of string segments rendered with `/` separators and a
/// leading slash. Every canonical path starts with the system root, e.g.
/// `/system/cart/pricing`. Nested spawns produce child addresses by
/// concatenation (`parent / "name"`).
///
/// # Canonical form
///
/// [`ActorPath::canonical`] produces the form the registry stores:
/// a missing path becomes `/system/<uuid-v4>`, and a caller path that is not
/// already anchored at the system root is re-anchored under it. All
/// operations are immutable and return new instances.
///
/// ```ignore
/// use switchboard::ActorPath;
///
/// let child = ActorPath::canonical(Some("cart/pricing"));
/// assert_eq!(child.to_string(), "/system/cart/pricing");
/// assert_eq!(child.parent().to_string(), "/system/cart");
/// assert_eq!(child.key(), "pricing");
/// ```
#[derive(
    Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ActorPath(Vec<String>);

impl ActorPath {
    /// Returns the system prefix path, `/system`.
    pub fn system_prefix() -> Self {
        ActorPath(vec![SYSTEM_ROOT.to_owned()])
    }

    /// Builds the canonical address for a caller-supplied path.
    ///
    /// If `path` is absent or empty a fresh UUID segment is allocated under
    /// the system prefix. If the supplied path is not anchored at the system
    /// root it is re-anchored under it. An already canonical path is
    /// returned unchanged.
    ///
    /// # Arguments
    ///
    /// * `path` - The caller-supplied path, if any.
    ///
    /// # Returns
    ///
    /// Returns the canonical actor path.
    ///
    pub fn canonical(path: Option<&str>) -> Self {
        match path {
            None => Self::system_prefix() / Uuid::new_v4().to_string().as_str(),
            Some(value) => {
                let parsed = ActorPath::from(value);
                if parsed.is_empty() {
                    Self::system_prefix()
                        / Uuid::new_v4().to_string().as_str()
                } else {
                    parsed.anchored()
                }
            }
        }
    }

    /// Re-anchors this path under the system prefix if it is not already
    /// anchored there.
    pub fn anchored(&self) -> Self {
        if self.is_anchored() {
            self.clone()
        } else {
            let mut segments = vec![SYSTEM_ROOT.to_owned()];
            segments.extend(self.0.iter().cloned());
            ActorPath(segments)
        }
    }

    /// True if the first segment of this path is the system root.
    pub fn is_anchored(&self) -> bool {
        self.0.first().map(|s| s == SYSTEM_ROOT).unwrap_or(false)
    }

    /// Obtains the parent address by removing the last segment.
    ///
    /// The parent of a path directly under the system root, and of the
    /// system root itself, is the system prefix.
    ///
    /// # Returns
    ///
    /// Returns the parent actor path.
    ///
    pub fn parent(&self) -> Self {
        if self.0.len() > 1 {
            let mut segments = self.0.clone();
            segments.truncate(segments.len() - 1);
            ActorPath(segments)
        } else {
            Self::system_prefix()
        }
    }

    /// Retrieves the final segment of this path, the actor's local name.
    ///
    /// # Returns
    ///
    /// Returns the last segment, or an empty string for an empty path.
    ///
    pub fn key(&self) -> String {
        self.0.last().cloned().unwrap_or_else(|| "".to_owned())
    }

    /// Returns the number of segments in this path.
    pub fn level(&self) -> usize {
        self.0.len()
    }

    /// Checks whether this path contains any segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Determines if this path is the direct child of another path.
    ///
    /// # Arguments
    ///
    /// * `other` - The candidate parent path.
    ///
    /// # Returns
    ///
    /// Returns `true` only for immediate parent-child relationships; a path
    /// is never a child of itself.
    ///
    pub fn is_child_of(&self, other: &ActorPath) -> bool {
        *self != *other && self.parent() == *other
    }

    /// Determines if this path is the direct parent of another path.
    pub fn is_parent_of(&self, other: &ActorPath) -> bool {
        other.is_child_of(self)
    }
}

/// Parses a string into an ActorPath.
///
/// Segments are split on `/`; empty and whitespace-only segments are
/// discarded, so `"/a//b/"` parses the same as `"/a/b"`. Parsing never
/// anchors: canonicalization is explicit via [`ActorPath::canonical`].
impl From<&str> for ActorPath {
    fn from(str: &str) -> Self {
        let segments: Vec<String> = str
            .split('/')
            .filter(|x| !x.trim().is_empty())
            .map(|s| s.to_owned())
            .collect();
        ActorPath(segments)
    }
}

impl From<String> for ActorPath {
    fn from(string: String) -> Self {
        ActorPath::from(string.as_str())
    }
}

impl From<&String> for ActorPath {
    fn from(string: &String) -> Self {
        ActorPath::from(string.as_str())
    }
}

/// Creates a child path by appending segments parsed from the right-hand
/// string, enabling `parent / "name"` joins.
impl std::ops::Div<&str> for ActorPath {
    type Output = ActorPath;

    fn div(self, rhs: &str) -> Self::Output {
        let mut segments = self.0;
        let mut tokens: Vec<String> = rhs
            .split('/')
            .filter(|x| !x.trim().is_empty())
            .map(|s| s.to_owned())
            .collect();

        segments.append(&mut tokens);
        ActorPath(segments)
    }
}

/// Formats the path in its canonical `/segment/segment` form.
///
/// The output round-trips through `ActorPath::from`.
impl std::fmt::Display for ActorPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self.level().cmp(&1) {
            Ordering::Less => write!(f, "/"),
            Ordering::Equal => write!(f, "/{}", self.0[0]),
            Ordering::Greater => write!(f, "/{}", self.0.join("/")),
        }
    }
}

/// Debug formatting mirrors Display: the logical path is the value.
impl std::fmt::Debug for ActorPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self.level().cmp(&1) {
            Ordering::Less => write!(f, "/"),
            Ordering::Equal => write!(f, "/{}", self.0[0]),
            Ordering::Greater => write!(f, "/{}", self.0.join("/")),
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn parse_empty_string() {
        let path = ActorPath::from("");
        assert!(path.is_empty());
        assert_eq!(path.to_string(), "/");
    }

    #[test]
    fn parse_two_deep() {
        let path = ActorPath::from("/system/child");
        assert_eq!(path.level(), 2);
        assert_eq!(path.key(), "child");
    }

    #[test]
    fn parse_collapses_extra_slashes() {
        let path = ActorPath::from("//system///a/");
        assert_eq!(path.to_string(), "/system/a");
    }

    #[test]
    fn canonical_generates_uuid_when_absent() {
        let path = ActorPath::canonical(None);
        assert_eq!(path.level(), 2);
        assert!(path.is_anchored());
        assert!(!path.key().is_empty());
    }

    #[test]
    fn canonical_anchors_relative_path() {
        let path = ActorPath::canonical(Some("cart/pricing"));
        assert_eq!(path.to_string(), "/system/cart/pricing");
    }

    #[test]
    fn canonical_keeps_anchored_path() {
        let path = ActorPath::canonical(Some("/system/cart"));
        assert_eq!(path.to_string(), "/system/cart");
    }

    #[test]
    fn parent_of_nested() {
        let path = ActorPath::from("/system/cart/pricing");
        assert_eq!(path.parent().to_string(), "/system/cart");
    }

    #[test]
    fn parent_of_root_is_prefix() {
        let path = ActorPath::from("/system/cart");
        assert_eq!(path.parent(), ActorPath::system_prefix());
        assert_eq!(
            ActorPath::system_prefix().parent(),
            ActorPath::system_prefix()
        );
    }

    #[test]
    fn child_join() {
        let parent = ActorPath::from("/system/cart");
        let child = parent.clone() / "pricing";
        assert_eq!(child.to_string(), "/system/cart/pricing");
        assert!(parent.is_parent_of(&child));
        assert!(child.is_child_of(&parent));
        assert!(!parent.is_child_of(&parent));
    }

    #[test]
    fn display_round_trip() {
        let path = ActorPath::from("/system/a/b/c");
        assert_eq!(ActorPath::from(path.to_string()), path);
    }
}
