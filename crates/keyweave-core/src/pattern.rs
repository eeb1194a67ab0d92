// Keyweave Pattern Definitions
// Declarative sequence/chord/hold patterns and their validation

use std::collections::HashSet;

use indexmap::IndexMap;
use strum_macros::{Display, EnumString};

use crate::config::KeySpecError;
use crate::{Key, ModifierRequirement, NormalizedKeyEvent};

/// Kind of a pattern, without its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PatternType {
    Sequence,
    Chord,
    Hold,
}

/// Canonical key plus an optional modifier subset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyMatcher {
    /// Canonical key the event must carry
    pub key: Key,
    /// Key as written by the pattern author; consulted by case-sensitive
    /// patterns to tell `a` from `A`
    pub literal: String,
    /// Modifier constraints; modifiers not listed are unconstrained
    pub modifiers: ModifierRequirement,
}

impl KeyMatcher {
    /// Matcher for a key with no modifier constraints
    pub fn new(key: &str) -> Self {
        Self {
            key: Key::from_alias(key),
            literal: key.trim().to_string(),
            modifiers: ModifierRequirement::new(),
        }
    }

    /// Add modifier constraints
    pub fn with_modifiers(mut self, modifiers: ModifierRequirement) -> Self {
        self.modifiers = modifiers;
        self
    }

    fn case_literal(&self) -> Option<char> {
        let mut chars = self.literal.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_alphabetic() => Some(c),
            _ => None,
        }
    }

    /// Check an event against this matcher
    pub fn matches(&self, event: &NormalizedKeyEvent, case_sensitive: bool) -> bool {
        if event.key != self.key {
            return false;
        }
        if case_sensitive {
            if let Some(expected) = self.case_literal() {
                let mut raw = event.raw_key.chars();
                if raw.next() != Some(expected) || raw.next().is_some() {
                    return false;
                }
            }
        }
        self.modifiers.is_satisfied_by(&event.modifiers)
    }
}

impl From<&str> for KeyMatcher {
    fn from(key: &str) -> Self {
        KeyMatcher::new(key)
    }
}

/// Ordered key sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSpec {
    pub keys: Vec<KeyMatcher>,
    /// Max gap between consecutive presses; `None` uses the engine default
    pub timeout_ms: Option<u64>,
    /// Skip non-matching presses inside the window instead of failing
    pub allow_intervening: bool,
    /// Abandon partial progress when a press breaks the order
    pub reset_on_mismatch: bool,
}

/// Unordered set of simultaneously held keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordSpec {
    pub keys: Vec<KeyMatcher>,
    /// Match while additional keys are also down
    pub allow_extra: bool,
}

/// Single key held for a minimum duration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldSpec {
    pub key: KeyMatcher,
    /// Minimum hold time; `None` uses the engine default
    pub min_duration_ms: Option<u64>,
    /// Modifiers that must be down at press time and stay down
    pub required_modifiers: Option<ModifierRequirement>,
}

/// Parameters of a pattern, by kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternKind {
    Sequence(SequenceSpec),
    Chord(ChordSpec),
    Hold(HoldSpec),
}

impl PatternKind {
    /// Get the parameterless kind
    pub fn pattern_type(&self) -> PatternType {
        match self {
            PatternKind::Sequence(_) => PatternType::Sequence,
            PatternKind::Chord(_) => PatternType::Chord,
            PatternKind::Hold(_) => PatternType::Hold,
        }
    }

    /// Key matchers referenced by this pattern, in declaration order
    pub fn matchers(&self) -> &[KeyMatcher] {
        match self {
            PatternKind::Sequence(spec) => &spec.keys,
            PatternKind::Chord(spec) => &spec.keys,
            PatternKind::Hold(spec) => std::slice::from_ref(&spec.key),
        }
    }
}

/// A host-supplied pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternDefinition {
    /// Unique identifier, reported in every match
    pub id: String,
    /// Optional display name
    pub name: Option<String>,
    /// Distinguish letter case using the host-reported key value
    pub case_sensitive: bool,
    pub kind: PatternKind,
}

impl PatternDefinition {
    /// Create a pattern
    pub fn new(id: impl Into<String>, kind: PatternKind) -> Self {
        Self {
            id: id.into(),
            name: None,
            case_sensitive: false,
            kind,
        }
    }

    /// Create a sequence pattern with default options
    pub fn sequence<K: Into<KeyMatcher>>(
        id: impl Into<String>,
        keys: impl IntoIterator<Item = K>,
        timeout_ms: u64,
    ) -> Self {
        Self::new(
            id,
            PatternKind::Sequence(SequenceSpec {
                keys: keys.into_iter().map(Into::into).collect(),
                timeout_ms: Some(timeout_ms),
                allow_intervening: false,
                reset_on_mismatch: false,
            }),
        )
    }

    /// Create a chord pattern that requires the exact key set
    pub fn chord<K: Into<KeyMatcher>>(id: impl Into<String>, keys: impl IntoIterator<Item = K>) -> Self {
        Self::new(
            id,
            PatternKind::Chord(ChordSpec {
                keys: keys.into_iter().map(Into::into).collect(),
                allow_extra: false,
            }),
        )
    }

    /// Create a hold pattern without modifier requirements
    pub fn hold(id: impl Into<String>, key: impl Into<KeyMatcher>, min_duration_ms: u64) -> Self {
        Self::new(
            id,
            PatternKind::Hold(HoldSpec {
                key: key.into(),
                min_duration_ms: Some(min_duration_ms),
                required_modifiers: None,
            }),
        )
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Enable case-sensitive matching
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Get the parameterless kind
    pub fn pattern_type(&self) -> PatternType {
        self.kind.pattern_type()
    }

    /// Identity of the pattern for reconfiguration diffs: kind plus the
    /// keys and modifiers it matches on. Timing options are not part of it.
    pub fn structure(&self) -> (PatternType, Vec<(&Key, &ModifierRequirement)>) {
        let keys = self
            .kind
            .matchers()
            .iter()
            .map(|matcher| (&matcher.key, &matcher.modifiers))
            .collect();
        (self.pattern_type(), keys)
    }

    /// Validate the definition on its own (id uniqueness is checked by
    /// [`PatternSet`])
    pub fn validate(&self) -> Result<(), PatternError> {
        if self.id.trim().is_empty() {
            return Err(PatternError::EmptyId);
        }
        let id = || self.id.clone();
        let matchers = self.kind.matchers();
        if matchers.is_empty() {
            return Err(PatternError::EmptyKeys { id: id() });
        }
        if matchers.iter().any(|matcher| matcher.key.as_str().is_empty()) {
            return Err(PatternError::EmptyKey { id: id() });
        }
        match &self.kind {
            PatternKind::Sequence(spec) => {
                if spec.timeout_ms == Some(0) {
                    return Err(PatternError::ZeroTimeout { id: id() });
                }
            }
            PatternKind::Chord(spec) => {
                let mut seen = HashSet::new();
                for matcher in &spec.keys {
                    if !seen.insert(&matcher.key) {
                        return Err(PatternError::DuplicateChordKey {
                            id: id(),
                            key: matcher.key.clone(),
                        });
                    }
                }
            }
            PatternKind::Hold(spec) => {
                if spec.min_duration_ms == Some(0) {
                    return Err(PatternError::ZeroDuration { id: id() });
                }
            }
        }
        Ok(())
    }
}

/// Pattern registration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("pattern id is empty")]
    EmptyId,

    #[error("duplicate pattern id: {0}")]
    DuplicateId(String),

    #[error("pattern '{id}' has no keys")]
    EmptyKeys { id: String },

    #[error("pattern '{id}' has an empty key")]
    EmptyKey { id: String },

    #[error("chord '{id}' lists key {key} twice")]
    DuplicateChordKey { id: String, key: Key },

    #[error("sequence '{id}' has {steps} steps but the buffer holds {max}")]
    SequenceTooLong { id: String, steps: usize, max: usize },

    #[error("sequence '{id}' has a zero timeout")]
    ZeroTimeout { id: String },

    #[error("hold '{id}' has a zero duration")]
    ZeroDuration { id: String },

    #[error("pattern '{id}' is missing field '{field}'")]
    MissingField { id: String, field: &'static str },

    #[error("pattern '{id}': unknown kind '{kind}'")]
    UnknownKind { id: String, kind: String },

    #[error("pattern '{id}': {source}")]
    InvalidKeySpec {
        id: String,
        #[source]
        source: KeySpecError,
    },
}

/// Validated patterns, keyed by id in registration order
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: IndexMap<String, PatternDefinition>,
}

impl PatternSet {
    /// Validate definitions, keeping the valid ones.
    ///
    /// Invalid definitions and later duplicates of an id are excluded and
    /// reported; they never stop the rest from registering.
    pub fn build(definitions: impl IntoIterator<Item = PatternDefinition>) -> (Self, Vec<PatternError>) {
        Self::build_bounded(definitions, usize::MAX)
    }

    /// Like [`PatternSet::build`], also rejecting sequences longer than
    /// `max_sequence_len`, which a buffer of that length can never match.
    pub fn build_bounded(
        definitions: impl IntoIterator<Item = PatternDefinition>,
        max_sequence_len: usize,
    ) -> (Self, Vec<PatternError>) {
        let mut patterns = IndexMap::new();
        let mut rejected = Vec::new();
        for definition in definitions {
            if let Err(err) = definition.validate() {
                rejected.push(err);
                continue;
            }
            if let PatternKind::Sequence(spec) = &definition.kind {
                if spec.keys.len() > max_sequence_len {
                    rejected.push(PatternError::SequenceTooLong {
                        id: definition.id.clone(),
                        steps: spec.keys.len(),
                        max: max_sequence_len,
                    });
                    continue;
                }
            }
            if patterns.contains_key(&definition.id) {
                rejected.push(PatternError::DuplicateId(definition.id.clone()));
                continue;
            }
            patterns.insert(definition.id.clone(), definition);
        }
        (Self { patterns }, rejected)
    }

    /// Get a pattern by id
    pub fn get(&self, id: &str) -> Option<&PatternDefinition> {
        self.patterns.get(id)
    }

    /// Iterate patterns in registration order
    pub fn iter(&self) -> impl Iterator<Item = &PatternDefinition> {
        self.patterns.values()
    }

    /// Iterate patterns of one kind
    pub fn of_type(&self, pattern_type: PatternType) -> impl Iterator<Item = &PatternDefinition> {
        self.patterns
            .values()
            .filter(move |definition| definition.pattern_type() == pattern_type)
    }

    /// Get the number of patterns
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Check whether both sets have the same ids with the same structure
    pub fn same_structure(&self, other: &PatternSet) -> bool {
        self.patterns.len() == other.patterns.len()
            && self.patterns.iter().all(|(id, definition)| {
                other
                    .patterns
                    .get(id)
                    .is_some_and(|theirs| theirs.structure() == definition.structure())
            })
    }
}
