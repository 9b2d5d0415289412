//! Crash taxonomy of the emulators. A crash is recorded on the world and
//! turns the remaining instructions into no-ops; it never crosses the
//! emulator boundary as an error.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrashKind {
    Wall,
    OutOfWorld,
    ForbiddenArea,
    GridNotExist,
    ExceedMaxCalls,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crash {
    #[serde(rename = "crash_type")]
    pub kind: CrashKind,
    /// Turtle position `(x, y)` when the crash happened.
    pub pos: (i64, i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_render_in_wire_case() {
        assert_eq!(CrashKind::OutOfWorld.to_string(), "OUT_OF_WORLD");
        assert_eq!(CrashKind::Wall.to_string(), "WALL");
        assert_eq!(CrashKind::ExceedMaxCalls.to_string(), "EXCEED_MAX_CALLS");
    }
}
