// Keyweave Core Library
// Keyboard event normalization and temporal pattern recognition

pub mod action;
pub mod config;
pub mod debug;
pub mod dispatch;
pub mod engine;
pub mod input;
pub mod key;
pub mod modifier;
pub mod normalize;
pub mod numpad;
pub mod pattern;
pub mod pipeline;
pub mod state;

pub use action::Action;
pub use config::{parse_key_spec, KeySpecError};
pub use dispatch::{MatchLog, MatchSink};
pub use engine::{
    EngineConfig, HoldProgress, ManualScheduler, MatchHistory, MatchedPattern, Scheduler, SequenceEngine,
    TimerFire, TimerToken,
};
pub use input::{NormalizedKeyEvent, RawKeyEvent, RawModifiers, ReleaseTiming};
pub use key::Key;
pub use modifier::{LockKey, LockState, Modifier, ModifierRequirement, ModifierState};
pub use normalize::{normalize_event, ModifierTracker, Normalizer, NormalizerConfig, QuirkFilter};
pub use numpad::{NumpadDetail, NumpadMode};
pub use pattern::{
    ChordSpec, HoldSpec, KeyMatcher, PatternDefinition, PatternError, PatternKind, PatternSet, PatternType,
    SequenceSpec,
};
pub use pipeline::{InputPipeline, PipelineOutput};
pub use state::HeldKeyLedger;

#[cfg(feature = "config")]
pub use config::{Config, ConfigError};
