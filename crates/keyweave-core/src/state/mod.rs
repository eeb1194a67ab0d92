// Keyweave State
// Tracking of keys currently held down

mod ledger;

pub use ledger::{HeldEntry, HeldKeyLedger};
