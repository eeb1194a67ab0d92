// Keyweave Config API
// Key spec parsing and TOML pattern files

pub mod matcher_parser;

#[cfg(feature = "config")]
pub mod parser;

pub use matcher_parser::{parse_key_spec, KeySpecError};

#[cfg(feature = "config")]
pub use parser::{Config, ConfigError, ConfigToml, EngineToml, NormalizerToml, PatternToml};
