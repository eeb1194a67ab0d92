// Keyweave CLI
// Validate pattern files and replay recorded key traces through the engine

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use keyweave_core::{
    Action, Config, InputPipeline, LockState, PatternKind, PipelineOutput, RawKeyEvent, RawModifiers,
};

/// Keyboard pattern recognition toolkit
#[derive(Parser, Debug)]
#[command(name = "keyweave")]
#[command(version)]
#[command(about = "Validate keyweave pattern files and replay key traces", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a pattern file and list its patterns
    Check {
        /// TOML pattern file (defaults to the user config directory)
        #[arg(value_name = "CONFIG")]
        config: Option<PathBuf>,

        /// Fail if any pattern entry is rejected
        #[arg(long)]
        strict: bool,
    },
    /// Feed a recorded trace through the pipeline and print what it produces
    Replay {
        /// TOML pattern file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// TOML trace of raw events
        #[arg(value_name = "TRACE")]
        trace: PathBuf,

        /// Only print matches
        #[arg(short, long)]
        quiet: bool,
    },
}

/// Recorded trace file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Trace {
    #[serde(default)]
    event: Vec<TraceEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TraceEvent {
    Press(TraceKey),
    Release(TraceKey),
    /// Window lost focus
    Blur { at: u64 },
    /// Window regained focus
    Focus { at: u64 },
    /// Host-queried lock state
    Locks {
        #[serde(default)]
        caps_lock: bool,
        #[serde(default)]
        num_lock: bool,
        #[serde(default)]
        scroll_lock: bool,
    },
    /// Let the clock run without input
    Advance { at: u64 },
}

#[derive(Debug, Deserialize)]
struct TraceKey {
    at: u64,
    #[serde(default)]
    key: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    modifiers: RawModifiers,
    #[serde(default)]
    repeat: bool,
    #[serde(default)]
    default_prevented: bool,
}

impl TraceKey {
    fn into_raw(self, action: Action) -> RawKeyEvent {
        let mut raw = RawKeyEvent::new(action, self.key, self.code, self.at).with_modifiers(self.modifiers);
        raw.repeat = self.repeat;
        raw.default_prevented = self.default_prevented;
        raw
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("keyweave").join("patterns.toml"))
}

fn load_config(path: &Path) -> Result<Config> {
    Config::from_toml_path(path).with_context(|| format!("failed to load {}", path.display()))
}

fn check(config: Option<PathBuf>, strict: bool) -> Result<()> {
    let path = match config.or_else(default_config_path) {
        Some(path) => path,
        None => bail!("no config path given and no user config directory found"),
    };
    let config = load_config(&path)?;

    println!("{}: {} patterns", path.display(), config.patterns.len());
    for pattern in &config.patterns {
        let keys: Vec<&str> = pattern.kind.matchers().iter().map(|m| m.literal.as_str()).collect();
        let detail = match &pattern.kind {
            PatternKind::Sequence(spec) => format!(
                "timeout {}ms",
                spec.timeout_ms.unwrap_or(config.engine.sequence_timeout_ms)
            ),
            PatternKind::Chord(spec) if spec.allow_extra => "extra keys allowed".to_string(),
            PatternKind::Chord(_) => "exact".to_string(),
            PatternKind::Hold(spec) => format!(
                "{}ms",
                spec.min_duration_ms.unwrap_or(config.engine.hold_threshold_ms)
            ),
        };
        println!(
            "  {:<8} {:<20} [{}] {}",
            pattern.pattern_type().to_string(),
            pattern.id,
            keys.join(", "),
            detail
        );
    }
    for err in &config.rejected {
        println!("  rejected: {}", err);
    }

    if strict {
        config.into_strict()?;
    }
    Ok(())
}

fn print_output(output: &PipelineOutput, quiet: bool) {
    if !quiet {
        for event in &output.events {
            println!("  {}", event);
        }
    }
    for matched in &output.matches {
        println!("MATCH @{} {}", matched.matched_at, matched);
    }
}

fn replay(config_path: &Path, trace_path: &Path, quiet: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let content =
        fs::read_to_string(trace_path).with_context(|| format!("failed to read {}", trace_path.display()))?;
    let trace: Trace = toml::from_str(&content).with_context(|| format!("invalid trace {}", trace_path.display()))?;

    log::info!(
        "replaying {} events against {} patterns",
        trace.event.len(),
        config.patterns.len()
    );

    let mut pipeline = InputPipeline::new(config.engine.clone(), config.normalizer.clone());
    pipeline.set_patterns(config.patterns);

    let mut matches = 0;
    for event in trace.event {
        let output = match event {
            TraceEvent::Press(key) => pipeline.handle_raw(key.into_raw(Action::Press)),
            TraceEvent::Release(key) => pipeline.handle_raw(key.into_raw(Action::Release)),
            TraceEvent::Blur { at } => pipeline.set_focus(false, at),
            TraceEvent::Focus { at } => pipeline.set_focus(true, at),
            TraceEvent::Locks {
                caps_lock,
                num_lock,
                scroll_lock,
            } => {
                pipeline.set_lock_state(LockState {
                    caps_lock,
                    num_lock,
                    scroll_lock,
                });
                PipelineOutput::default()
            }
            TraceEvent::Advance { at } => pipeline.advance_to(at),
        };
        matches += output.matches.len();
        print_output(&output, quiet);
    }

    // Let pending holds and settles finish
    while let Some(deadline) = pipeline.engine().scheduler().next_deadline() {
        let output = pipeline.advance_to(deadline);
        matches += output.matches.len();
        print_output(&output, quiet);
    }

    println!("{} matches", matches);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    match args.command {
        Command::Check { config, strict } => check(config, strict),
        Command::Replay { config, trace, quiet } => replay(&config, &trace, quiet),
    }
}
