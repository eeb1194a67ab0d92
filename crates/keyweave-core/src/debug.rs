// Keyweave Debug Toggle
// Per-component debug logging, enabled by config or by KEYWEAVE_DEBUG

use std::sync::OnceLock;

fn env_debug_enabled() -> bool {
    static DEBUG: OnceLock<bool> = OnceLock::new();
    *DEBUG.get_or_init(|| {
        std::env::var("KEYWEAVE_DEBUG")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes" | "on"))
            .unwrap_or(false)
    })
}

/// Whether per-event debug logging is on for a component
pub fn enabled(toggle: bool) -> bool {
    toggle || env_debug_enabled()
}
