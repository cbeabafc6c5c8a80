//! Remote control input: logical actions, the shared held-key state and the
//! bridge that feeds it to the simulation.

pub mod bridge;
pub mod state;

pub use bridge::InputBridge;
pub use state::InputState;

use serde::Serialize;

/// Abstract control intent, decoupled from the key that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalAction {
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    Fire,
}

impl LogicalAction {
    pub const ALL: [LogicalAction; 5] = [
        LogicalAction::MoveLeft,
        LogicalAction::MoveRight,
        LogicalAction::MoveUp,
        LogicalAction::MoveDown,
        LogicalAction::Fire,
    ];

    const fn bit(self) -> u8 {
        match self {
            LogicalAction::MoveLeft => 1 << 0,
            LogicalAction::MoveRight => 1 << 1,
            LogicalAction::MoveUp => 1 << 2,
            LogicalAction::MoveDown => 1 << 3,
            LogicalAction::Fire => 1 << 4,
        }
    }
}

/// Browser `KeyboardEvent.code` values understood by the server
const KEY_MAP: &[(&str, LogicalAction)] = &[
    ("KeyA", LogicalAction::MoveLeft),
    ("ArrowLeft", LogicalAction::MoveLeft),
    ("KeyD", LogicalAction::MoveRight),
    ("ArrowRight", LogicalAction::MoveRight),
    ("KeyW", LogicalAction::MoveUp),
    ("ArrowUp", LogicalAction::MoveUp),
    ("KeyS", LogicalAction::MoveDown),
    ("ArrowDown", LogicalAction::MoveDown),
    ("Space", LogicalAction::Fire),
    ("KeyF", LogicalAction::Fire),
];

/// A transport key that maps to a logical action.
///
/// Holds the interned key name from the table so held keys can be stored
/// without allocating per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MappedKey {
    pub key: &'static str,
    pub action: LogicalAction,
}

/// Translate a transport key identifier. Unknown keys yield `None`.
pub fn translate(transport_key: &str) -> Option<MappedKey> {
    KEY_MAP
        .iter()
        .find(|(key, _)| *key == transport_key)
        .map(|&(key, action)| MappedKey { key, action })
}

/// Point-in-time set of asserted actions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionSet(u8);

impl ActionSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, action: LogicalAction) {
        self.0 |= action.bit();
    }

    pub fn remove(&mut self, action: LogicalAction) {
        self.0 &= !action.bit();
    }

    pub fn contains(&self, action: LogicalAction) -> bool {
        self.0 & action.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub(crate) const fn bits(self) -> u8 {
        self.0
    }

    pub(crate) const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b1_1111)
    }

    pub fn iter(&self) -> impl Iterator<Item = LogicalAction> + '_ {
        LogicalAction::ALL.into_iter().filter(|a| self.contains(*a))
    }
}

impl FromIterator<LogicalAction> for ActionSet {
    fn from_iter<I: IntoIterator<Item = LogicalAction>>(iter: I) -> Self {
        let mut set = ActionSet::empty();
        for action in iter {
            set.insert(action);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_both_key_layouts() {
        assert_eq!(translate("KeyA").map(|k| k.action), Some(LogicalAction::MoveLeft));
        assert_eq!(translate("ArrowLeft").map(|k| k.action), Some(LogicalAction::MoveLeft));
        assert_eq!(translate("KeyF").map(|k| k.action), Some(LogicalAction::Fire));
        assert_eq!(translate("Space").map(|k| k.action), Some(LogicalAction::Fire));
    }

    #[test]
    fn unknown_keys_are_unmapped() {
        assert!(translate("KeyQ").is_none());
        assert!(translate("").is_none());
        // Case sensitive, like KeyboardEvent.code
        assert!(translate("arrowleft").is_none());
    }

    #[test]
    fn action_set_membership() {
        let mut set: ActionSet = [LogicalAction::Fire, LogicalAction::MoveUp].into_iter().collect();
        assert!(set.contains(LogicalAction::Fire));
        assert!(!set.contains(LogicalAction::MoveDown));

        set.insert(LogicalAction::Fire);
        set.remove(LogicalAction::Fire);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![LogicalAction::MoveUp]);
    }
}
