// Keyweave Input Layer
// Raw host notifications and their normalized form

mod event;
mod raw;

pub use event::{NormalizedKeyEvent, ReleaseTiming};
pub use raw::{RawKeyEvent, RawModifiers};
