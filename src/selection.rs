// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Address selection
//!
//! Compiles address patterns for `actor_selection`. An absolute pattern
//! (leading `/`) is used as-is; a relative one is anchored under the given
//! prefix. One trailing slash is stripped. Matching is glob-style with
//! literal separators: `*` stays within one path segment, `**` crosses
//! segments.
//!

use crate::{ActorPath, Error};

use glob::{MatchOptions, Pattern};

/// Compiles a selection pattern anchored at `prefix`.
pub(crate) fn compile(
    pattern: &str,
    prefix: &ActorPath,
) -> Result<Pattern, Error> {
    let anchored = if pattern.starts_with('/') {
        pattern.to_owned()
    } else {
        format!("{}/{}", prefix, pattern)
    };
    let anchored = anchored.strip_suffix('/').unwrap_or(&anchored);
    Pattern::new(anchored).map_err(|error| Error::Selection(error.to_string()))
}

/// True if the compiled pattern matches the given address.
pub(crate) fn matches(pattern: &Pattern, address: &ActorPath) -> bool {
    let options = MatchOptions {
        require_literal_separator: true,
        ..MatchOptions::default()
    };
    pattern.matches_with(&address.to_string(), options)
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_absolute_pattern() {
        let pattern =
            compile("/system/a/*", &ActorPath::system_prefix()).unwrap();
        assert!(matches(&pattern, &ActorPath::from("/system/a/1")));
        assert!(matches(&pattern, &ActorPath::from("/system/a/2")));
        assert!(!matches(&pattern, &ActorPath::from("/system/b/1")));
    }

    #[test]
    fn test_star_does_not_cross_segments() {
        let pattern =
            compile("/system/*", &ActorPath::system_prefix()).unwrap();
        assert!(matches(&pattern, &ActorPath::from("/system/a")));
        assert!(!matches(&pattern, &ActorPath::from("/system/a/1")));
    }

    #[test]
    fn test_double_star_crosses_segments() {
        let pattern =
            compile("/system/**", &ActorPath::system_prefix()).unwrap();
        assert!(matches(&pattern, &ActorPath::from("/system/a/1")));
    }

    #[test]
    fn test_relative_pattern_anchors_to_prefix() {
        let prefix = ActorPath::from("/system/cart");
        let pattern = compile("items/*", &prefix).unwrap();
        assert!(matches(&pattern, &ActorPath::from("/system/cart/items/1")));
        assert!(!matches(&pattern, &ActorPath::from("/system/items/1")));
    }

    #[test]
    fn test_trailing_slash_stripped() {
        let pattern =
            compile("/system/a/", &ActorPath::system_prefix()).unwrap();
        assert!(matches(&pattern, &ActorPath::from("/system/a")));
    }

    #[test]
    fn test_invalid_pattern() {
        let result = compile("/system/[", &ActorPath::system_prefix());
        assert!(matches!(result, Err(Error::Selection(_))));
    }
}
