//! Key Composer Module
//!
//! Builds fully-qualified store keys from a logical key and optional prefixes.

/// Separator between key segments.
pub const KEY_SEPARATOR: char = ':';

// == Key Composer ==
/// Composes `group:subgroup:key`, omitting prefixes that are unset or empty.
///
/// No escaping is performed: a logical key containing `:` produces a key that
/// cannot be told apart from a prefixed one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyComposer {
    group_prefix: Option<String>,
}

impl KeyComposer {
    /// Creates a composer with a fixed group prefix.
    pub fn new(group_prefix: Option<String>) -> Self {
        Self {
            group_prefix: group_prefix.filter(|p| !p.is_empty()),
        }
    }

    // == Compose ==
    /// Returns the fully-qualified key for `key` under `sub_group_prefix`.
    pub fn compose(&self, key: &str, sub_group_prefix: Option<&str>) -> String {
        let mut composed = String::with_capacity(
            key.len()
                + self.group_prefix.as_ref().map_or(0, |p| p.len() + 1)
                + sub_group_prefix.map_or(0, |p| p.len() + 1),
        );

        for prefix in [self.group_prefix.as_deref(), sub_group_prefix]
            .into_iter()
            .flatten()
            .filter(|p| !p.is_empty())
        {
            composed.push_str(prefix);
            composed.push(KEY_SEPARATOR);
        }
        composed.push_str(key);
        composed
    }
}
