// Keyweave Key Actions
// Press/release edge of a host key notification

use strum_macros::{Display, EnumString};

/// Edge of a key notification.
///
/// Auto-repeat is not a separate action here: a repeated press is a
/// `Press` with the event's repeat flag set. Hosts name the edges
/// differently, so parsing accepts the browser event types too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, serde::Deserialize, serde::Serialize)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[strum(to_string = "release", serialize = "keyup", serialize = "up")]
    #[serde(alias = "keyup", alias = "up")]
    Release,
    #[strum(to_string = "press", serialize = "keydown", serialize = "down")]
    #[serde(alias = "keydown", alias = "down")]
    Press,
}

impl Action {
    /// Returns true if this is a PRESS event
    pub fn is_pressed(self) -> bool {
        matches!(self, Action::Press)
    }

    /// Returns true if this is a RELEASE event
    pub fn is_released(self) -> bool {
        matches!(self, Action::Release)
    }

    /// The other edge
    pub fn opposite(self) -> Self {
        match self {
            Action::Press => Action::Release,
            Action::Release => Action::Press,
        }
    }
}
