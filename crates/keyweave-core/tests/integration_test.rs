// Keyweave Integration Tests
// Config loading, sinks and engine bookkeeping through the public API

use std::sync::Arc;

use parking_lot::Mutex;

use keyweave_core::{
    Action, Config, EngineConfig, HoldProgress, InputPipeline, MatchLog, MatchSink, MatchedPattern,
    NormalizerConfig, PatternDefinition, RawKeyEvent, RawModifiers, SequenceEngine, TimerToken,
};

const PATTERNS: &str = r#"
[engine]
chord_settle_ms = 40
history_len = 10

[[pattern]]
id = "save-combo"
name = "Save combo"
kind = "sequence"
keys = ["j", "k"]
timeout_ms = 300

[[pattern]]
id = "konami"
kind = "sequence"
keys = ["ArrowUp", "ArrowUp", "ArrowDown", "ArrowDown"]
timeout_ms = 500

[[pattern]]
id = "quick-save"
kind = "chord"
keys = ["Ctrl", "s"]

[[pattern]]
id = "charge"
kind = "hold"
key = "Space"
duration_ms = 800
"#;

fn pipeline_from(source: &str) -> (InputPipeline, MatchLog) {
    let config = Config::from_toml(source).unwrap();
    assert!(config.rejected.is_empty(), "rejected: {:?}", config.rejected);
    let mut pipeline = InputPipeline::new(config.engine, config.normalizer);
    assert!(pipeline.set_patterns(config.patterns).is_empty());
    let log = MatchLog::new();
    pipeline.engine_mut().set_sink(Box::new(log.clone()));
    (pipeline, log)
}

fn tap(pipeline: &mut InputPipeline, key: &str, code: &str, at: u64) {
    pipeline.handle_raw(RawKeyEvent::press(key, code, at));
    pipeline.handle_raw(RawKeyEvent::release(key, code, at + 30));
}

fn ctrl() -> RawModifiers {
    RawModifiers {
        ctrl: true,
        ..RawModifiers::default()
    }
}

#[test]
fn test_config_file_drives_all_pattern_kinds() {
    let (mut pipeline, log) = pipeline_from(PATTERNS);

    tap(&mut pipeline, "j", "KeyJ", 0);
    tap(&mut pipeline, "k", "KeyK", 100);

    for (i, at) in [1000, 1200, 1400, 1600].into_iter().enumerate() {
        let (key, code) = if i < 2 { ("ArrowUp", "ArrowUp") } else { ("ArrowDown", "ArrowDown") };
        tap(&mut pipeline, key, code, at);
    }

    pipeline.handle_raw(RawKeyEvent::press("Control", "ControlLeft", 3000).with_modifiers(ctrl()));
    pipeline.handle_raw(RawKeyEvent::press("s", "KeyS", 3010).with_modifiers(ctrl()));
    pipeline.advance_to(3100);
    pipeline.handle_raw(RawKeyEvent::release("s", "KeyS", 3100).with_modifiers(ctrl()));
    pipeline.handle_raw(RawKeyEvent::release("Control", "ControlLeft", 3110));

    pipeline.handle_raw(RawKeyEvent::press(" ", "Space", 4000));
    pipeline.advance_to(5000);

    assert_eq!(log.ids(), vec!["save-combo", "konami", "quick-save", "charge"]);
    let matches = log.matches();
    assert_eq!(matches[0].name.as_deref(), Some("Save combo"));
    assert_eq!(matches[2].matched_at, 3050);
    assert_eq!(matches[3].end, 4800);
    assert_eq!(pipeline.history().len(), 4);
}

#[test]
fn test_config_keeps_valid_patterns_when_some_are_rejected() {
    let config = Config::from_toml(
        r#"
        [[pattern]]
        id = "ok"
        kind = "sequence"
        keys = ["a", "b"]

        [[pattern]]
        id = "broken"
        kind = "chord"
        keys = []
        "#,
    )
    .unwrap();
    assert_eq!(config.patterns.len(), 1);
    assert_eq!(config.rejected.len(), 1);
    assert!(config.into_strict().is_err());
}

#[test]
fn test_history_is_bounded() {
    let mut pipeline = InputPipeline::new(
        EngineConfig {
            history_len: 2,
            ..EngineConfig::default()
        },
        NormalizerConfig::default(),
    );
    pipeline.set_patterns(vec![PatternDefinition::sequence("xy", ["x", "y"], 300)]);

    for round in 0..3u64 {
        let base = round * 1000;
        tap(&mut pipeline, "x", "KeyX", base);
        tap(&mut pipeline, "y", "KeyY", base + 100);
    }

    let history = pipeline.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history.capacity(), 2);
    assert_eq!(history.latest().unwrap().start, 2000);
    assert_eq!(history.iter().next().unwrap().start, 1000);
}

#[test]
fn test_numlock_key_toggles_numpad_mapping() {
    let mut pipeline = InputPipeline::default();
    let off = pipeline.handle_raw(RawKeyEvent::press("ArrowDown", "Numpad2", 0));
    assert_eq!(off.events[0].key.as_str(), "ArrowDown");
    pipeline.handle_raw(RawKeyEvent::release("ArrowDown", "Numpad2", 20));

    tap(&mut pipeline, "NumLock", "NumLock", 100);
    assert!(pipeline.modifiers().num_lock);

    let on = pipeline.handle_raw(RawKeyEvent::press("2", "Numpad2", 200));
    assert_eq!(on.events[0].key.as_str(), "2");
    assert!(on.events[0].is_numpad());
}

#[test]
fn test_release_timing_uses_tap_threshold() {
    let mut pipeline = InputPipeline::new(
        EngineConfig {
            tap_threshold_ms: 150,
            ..EngineConfig::default()
        },
        NormalizerConfig::default(),
    );
    pipeline.handle_raw(RawKeyEvent::press("q", "KeyQ", 0));
    let quick = pipeline.handle_raw(RawKeyEvent::release("q", "KeyQ", 149));
    let timing = quick.events[0].release.unwrap();
    assert!(timing.is_tap && !timing.is_hold);

    pipeline.handle_raw(RawKeyEvent::press("q", "KeyQ", 1000));
    let slow = pipeline.handle_raw(RawKeyEvent::release("q", "KeyQ", 1150));
    let timing = slow.events[0].release.unwrap();
    assert_eq!(timing.duration_ms, 150);
    assert!(timing.is_hold && !timing.is_tap);

    // A release with no recorded press carries no timing
    let orphan = pipeline.handle_raw(RawKeyEvent::release("w", "KeyW", 2000));
    assert_eq!(orphan.events[0].release, None);
}

#[test]
fn test_stale_timer_token_is_ignored() {
    let mut engine = SequenceEngine::new(EngineConfig::default());
    engine.set_patterns(vec![PatternDefinition::hold("charge", "Space", 500)]);
    assert!(engine.on_timer(TimerToken(999), 100).is_empty());
    assert!(engine.history().is_empty());
}

#[derive(Debug, Default)]
struct Recorded {
    progress: Vec<HoldProgress>,
    cancelled: Vec<String>,
    matched: Vec<String>,
}

#[derive(Clone, Default)]
struct ProgressSink(Arc<Mutex<Recorded>>);

impl MatchSink for ProgressSink {
    fn on_match(&mut self, matched: &MatchedPattern) {
        self.0.lock().matched.push(matched.pattern_id.clone());
    }

    fn on_hold_progress(&mut self, progress: &HoldProgress) {
        self.0.lock().progress.push(progress.clone());
    }

    fn on_hold_cancelled(&mut self, pattern_id: &str) {
        self.0.lock().cancelled.push(pattern_id.to_string());
    }
}

#[test]
fn test_sink_sees_hold_progress_and_cancellation() {
    let sink = ProgressSink::default();
    let mut pipeline = InputPipeline::default();
    pipeline.set_patterns(vec![PatternDefinition::hold("charge", "Space", 500)]);
    pipeline.engine_mut().set_sink(Box::new(sink.clone()));

    pipeline.handle_raw(RawKeyEvent::press(" ", "Space", 0));
    pipeline.handle_raw(RawKeyEvent::release(" ", "Space", 200));
    pipeline.handle_raw(RawKeyEvent::press(" ", "Space", 1000));
    pipeline.advance_to(1500);

    let recorded = sink.0.lock();
    assert_eq!(recorded.cancelled, vec!["charge"]);
    assert_eq!(recorded.matched, vec!["charge"]);
    assert_eq!(recorded.progress.len(), 3);
    assert!(!recorded.progress[0].completed);
    assert_eq!(recorded.progress[1].started_at, 1000);
    assert!(recorded.progress[2].completed);
}

#[test]
fn test_closure_sink() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&seen);
    let mut engine = SequenceEngine::new(EngineConfig::default());
    engine.set_patterns(vec![PatternDefinition::chord("pair", ["a", "b"])]);
    engine.set_sink(Box::new(move |m: &MatchedPattern| captured.lock().push(m.matched_at)));

    let mut pipeline = InputPipeline::default();
    for raw in [
        RawKeyEvent::new(Action::Press, "a", "KeyA", 0),
        RawKeyEvent::new(Action::Press, "b", "KeyB", 10),
    ] {
        let batch = pipeline.handle_raw(raw);
        for event in &batch.events {
            engine.process(event);
        }
    }
    engine.advance_to(100);
    assert_eq!(*seen.lock(), vec![60]);
}
