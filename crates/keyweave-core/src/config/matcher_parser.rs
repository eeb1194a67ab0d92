// Keyweave Config API - Key Spec Parser
// Parses key specs like "Ctrl-Shift-s" into key matchers

use crate::{KeyMatcher, Modifier, ModifierRequirement};

/// Errors that can occur during key spec parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeySpecError {
    /// Empty input string
    #[error("key spec cannot be empty")]
    EmptyInput,
    /// Modifier alias not recognized
    #[error("unknown modifier: '{0}'")]
    UnknownModifier(String),
    /// Input ends with hyphen (e.g., "Ctrl-")
    #[error("key spec cannot end with hyphen")]
    TrailingHyphen,
}

/// Parse a key spec like "Ctrl-Shift-s" into a matcher.
///
/// Everything before the last hyphen is a modifier alias the event must
/// carry; the last part is the key. A lone `-` (or a spec ending in `--`)
/// names the minus key.
///
/// # Examples
/// ```
/// use keyweave_core::config::parse_key_spec;
/// use keyweave_core::Modifier;
/// let matcher = parse_key_spec("Ctrl-s").unwrap();
/// assert_eq!(matcher.key.as_str(), "s");
/// assert!(matcher.modifiers.requires_held(Modifier::Control));
/// ```
pub fn parse_key_spec(spec: &str) -> Result<KeyMatcher, KeySpecError> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(KeySpecError::EmptyInput);
    }
    if trimmed == "-" {
        return Ok(KeyMatcher::new("-"));
    }

    let (prefix, key) = if let Some(prefix) = trimmed.strip_suffix("--") {
        (prefix, "-")
    } else if trimmed.ends_with('-') {
        return Err(KeySpecError::TrailingHyphen);
    } else {
        match trimmed.rsplit_once('-') {
            Some((prefix, key)) => (prefix, key),
            None => ("", trimmed),
        }
    };

    let mut modifiers = ModifierRequirement::new();
    if !prefix.is_empty() {
        for alias in prefix.split('-') {
            let modifier =
                Modifier::from_alias(alias).ok_or_else(|| KeySpecError::UnknownModifier(alias.to_string()))?;
            // Repeated modifiers collapse into one constraint
            modifiers.require(modifier, true);
        }
    }

    Ok(KeyMatcher::new(key).with_modifiers(modifiers))
}
