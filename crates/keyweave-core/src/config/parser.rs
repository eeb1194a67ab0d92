// Keyweave Config Parser - TOML with Serde
// Parses engine settings and pattern lists from TOML files

use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::matcher_parser::{parse_key_spec, KeySpecError};
use crate::engine::EngineConfig;
use crate::normalize::NormalizerConfig;
use crate::pattern::{ChordSpec, HoldSpec, PatternKind, PatternType, SequenceSpec};
use crate::{KeyMatcher, Modifier, ModifierRequirement, PatternDefinition, PatternError, PatternSet};

/// Configuration parser errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] PatternError),
}

/// Root TOML table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigToml {
    #[serde(default)]
    pub engine: Option<EngineToml>,

    #[serde(default)]
    pub normalizer: Option<NormalizerToml>,

    #[serde(default)]
    pub pattern: Vec<PatternToml>,
}

/// `[engine]` table; omitted values keep their defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineToml {
    pub sequence_timeout_ms: Option<u64>,
    pub chord_settle_ms: Option<u64>,
    pub hold_threshold_ms: Option<u64>,
    pub tap_threshold_ms: Option<u64>,
    pub max_buffer_len: Option<usize>,
    pub history_len: Option<usize>,
    pub debug: Option<bool>,
}

/// `[normalizer]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NormalizerToml {
    pub numpad_phantom_filter: Option<bool>,
    pub phantom_window_ms: Option<u64>,
    pub genuine_release_gap_ms: Option<u64>,
}

/// One `[[pattern]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternToml {
    pub id: String,
    pub name: Option<String>,
    /// `sequence`, `chord` or `hold`
    pub kind: String,
    /// Key specs for sequences and chords
    #[serde(default)]
    pub keys: Vec<String>,
    /// Key spec for holds
    pub key: Option<String>,
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub allow_intervening: bool,
    #[serde(default)]
    pub reset_on_mismatch: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub allow_extra: bool,
    pub duration_ms: Option<u64>,
    /// Modifiers a hold requires
    #[serde(default)]
    pub modifiers: Vec<String>,
}

impl PatternToml {
    /// Convert to a pattern definition (not yet validated)
    pub fn to_definition(&self) -> Result<PatternDefinition, PatternError> {
        let pattern_type: PatternType = self.kind.trim().parse().map_err(|_| PatternError::UnknownKind {
            id: self.id.clone(),
            kind: self.kind.clone(),
        })?;

        let kind = match pattern_type {
            PatternType::Sequence => PatternKind::Sequence(SequenceSpec {
                keys: self.parse_keys()?,
                timeout_ms: self.timeout_ms,
                allow_intervening: self.allow_intervening,
                reset_on_mismatch: self.reset_on_mismatch,
            }),
            PatternType::Chord => PatternKind::Chord(ChordSpec {
                keys: self.parse_keys()?,
                allow_extra: self.allow_extra,
            }),
            PatternType::Hold => {
                let spec = self.key.as_deref().ok_or_else(|| PatternError::MissingField {
                    id: self.id.clone(),
                    field: "key",
                })?;
                PatternKind::Hold(HoldSpec {
                    key: self.parse_spec(spec)?,
                    min_duration_ms: self.duration_ms,
                    required_modifiers: self.parse_modifiers()?,
                })
            }
        };

        Ok(PatternDefinition {
            id: self.id.clone(),
            name: self.name.clone(),
            case_sensitive: self.case_sensitive,
            kind,
        })
    }

    fn parse_spec(&self, spec: &str) -> Result<KeyMatcher, PatternError> {
        parse_key_spec(spec).map_err(|source| PatternError::InvalidKeySpec {
            id: self.id.clone(),
            source,
        })
    }

    fn parse_keys(&self) -> Result<Vec<KeyMatcher>, PatternError> {
        self.keys.iter().map(|spec| self.parse_spec(spec)).collect()
    }

    fn parse_modifiers(&self) -> Result<Option<ModifierRequirement>, PatternError> {
        if self.modifiers.is_empty() {
            return Ok(None);
        }
        let mut required = ModifierRequirement::new();
        for alias in &self.modifiers {
            let modifier = Modifier::from_alias(alias).ok_or_else(|| PatternError::InvalidKeySpec {
                id: self.id.clone(),
                source: KeySpecError::UnknownModifier(alias.clone()),
            })?;
            required.require(modifier, true);
        }
        Ok(Some(required))
    }
}

/// Parsed configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub engine: EngineConfig,
    pub normalizer: NormalizerConfig,
    /// Valid patterns, in file order
    pub patterns: Vec<PatternDefinition>,
    /// Entries that were excluded, with the reason
    pub rejected: Vec<PatternError>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            normalizer: NormalizerConfig::default(),
            patterns: vec![],
            rejected: vec![],
        }
    }
}

impl Config {
    /// Parse a TOML configuration file
    pub fn from_toml_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string.
    ///
    /// Malformed pattern entries are collected in `rejected` rather than
    /// failing the whole file.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let toml_config: ConfigToml = toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))?;
        toml_config.to_config()
    }

    /// Fail on the first rejected pattern entry
    pub fn into_strict(self) -> Result<Self, ConfigError> {
        match self.rejected.first() {
            Some(err) => Err(ConfigError::InvalidPattern(err.clone())),
            None => Ok(self),
        }
    }
}

impl ConfigToml {
    /// Convert parsed TOML to internal Config structure
    fn to_config(&self) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        if let Some(engine) = &self.engine {
            let defaults = EngineConfig::default();
            config.engine = EngineConfig {
                sequence_timeout_ms: positive("engine.sequence_timeout_ms", engine.sequence_timeout_ms)?
                    .unwrap_or(defaults.sequence_timeout_ms),
                chord_settle_ms: engine.chord_settle_ms.unwrap_or(defaults.chord_settle_ms),
                hold_threshold_ms: positive("engine.hold_threshold_ms", engine.hold_threshold_ms)?
                    .unwrap_or(defaults.hold_threshold_ms),
                tap_threshold_ms: engine.tap_threshold_ms.unwrap_or(defaults.tap_threshold_ms),
                max_buffer_len: positive("engine.max_buffer_len", engine.max_buffer_len)?
                    .unwrap_or(defaults.max_buffer_len),
                history_len: engine.history_len.unwrap_or(defaults.history_len),
                debug: engine.debug.unwrap_or(defaults.debug),
            };
        }

        let defaults = NormalizerConfig::default();
        let normalizer = self.normalizer.clone().unwrap_or_default();
        config.normalizer = NormalizerConfig {
            numpad_phantom_filter: normalizer
                .numpad_phantom_filter
                .unwrap_or(defaults.numpad_phantom_filter),
            phantom_window_ms: normalizer.phantom_window_ms.unwrap_or(defaults.phantom_window_ms),
            genuine_release_gap_ms: normalizer
                .genuine_release_gap_ms
                .unwrap_or(defaults.genuine_release_gap_ms),
            debug: config.engine.debug,
        };

        let mut converted = Vec::new();
        for entry in &self.pattern {
            match entry.to_definition() {
                Ok(definition) => converted.push(definition),
                Err(err) => config.rejected.push(err),
            }
        }
        let (set, rejected) = PatternSet::build_bounded(converted, config.engine.max_buffer_len);
        config.rejected.extend(rejected);
        config.patterns = set.iter().cloned().collect();

        for err in &config.rejected {
            log::warn!("Skipping pattern: {}", err);
        }
        log::debug!(
            "Config parsed with {} patterns ({} rejected)",
            config.patterns.len(),
            config.rejected.len()
        );
        Ok(config)
    }
}

fn positive<T: PartialEq + Default>(field: &str, value: Option<T>) -> Result<Option<T>, ConfigError> {
    match value {
        Some(v) if v == T::default() => Err(ConfigError::InvalidValue(format!("{} must be greater than zero", field))),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml(
            r#"
            [engine]
            sequence_timeout_ms = 800
            chord_settle_ms = 30
            debug = true

            [normalizer]
            numpad_phantom_filter = true

            [[pattern]]
            id = "save-combo"
            name = "Save"
            kind = "sequence"
            keys = ["j", "k"]
            timeout_ms = 300

            [[pattern]]
            id = "copy"
            kind = "chord"
            keys = ["Ctrl", "c"]

            [[pattern]]
            id = "shield"
            kind = "hold"
            key = "e"
            modifiers = ["Shift"]
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.sequence_timeout_ms, 800);
        assert_eq!(config.engine.chord_settle_ms, 30);
        assert_eq!(config.engine.hold_threshold_ms, 500);
        assert!(config.normalizer.numpad_phantom_filter);
        assert!(config.normalizer.debug);
        assert_eq!(config.patterns.len(), 3);
        assert!(config.rejected.is_empty());

        let save = &config.patterns[0];
        assert_eq!(save.name.as_deref(), Some("Save"));
        match &save.kind {
            PatternKind::Sequence(spec) => {
                assert_eq!(spec.keys.len(), 2);
                assert_eq!(spec.timeout_ms, Some(300));
            }
            other => panic!("expected sequence, got {:?}", other),
        }

        match &config.patterns[2].kind {
            PatternKind::Hold(spec) => {
                assert_eq!(spec.min_duration_ms, None);
                assert!(spec.required_modifiers.as_ref().unwrap().requires_held(Modifier::Shift));
            }
            other => panic!("expected hold, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_patterns_are_collected() {
        let config = Config::from_toml(
            r#"
            [[pattern]]
            id = "empty"
            kind = "chord"
            keys = []

            [[pattern]]
            id = "weird"
            kind = "combo"
            keys = ["a"]

            [[pattern]]
            id = "nokey"
            kind = "hold"

            [[pattern]]
            id = "badmod"
            kind = "sequence"
            keys = ["Hyper-a"]

            [[pattern]]
            id = "ok"
            kind = "sequence"
            keys = ["a", "b"]
            "#,
        )
        .unwrap();
        assert_eq!(config.patterns.len(), 1);
        assert_eq!(config.rejected.len(), 4);
        // Entries that fail to convert come first, then validation failures
        assert!(matches!(config.rejected[0], PatternError::UnknownKind { .. }));
        assert!(matches!(config.rejected[1], PatternError::MissingField { field: "key", .. }));
        assert!(matches!(config.rejected[2], PatternError::InvalidKeySpec { .. }));
        assert!(matches!(config.rejected[3], PatternError::EmptyKeys { .. }));
    }

    #[test]
    fn test_strict_mode_fails_on_rejected() {
        let config = Config::from_toml(
            r#"
            [[pattern]]
            id = "zero"
            kind = "hold"
            key = "Space"
            duration_ms = 0
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.into_strict(),
            Err(ConfigError::InvalidPattern(PatternError::ZeroDuration { .. }))
        ));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result = Config::from_toml(
            r#"
            [engine]
            sequence_timeout = 100
            "#,
        );
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_zero_engine_value_rejected() {
        let result = Config::from_toml(
            r#"
            [engine]
            max_buffer_len = 0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }
}
