//! Static gesture command tables and the per-hand resolver.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::gesture::{GestureLabel, HandSide};

/// Which hand(s) a command table entry applies to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HandScope {
    Left,
    Right,
    Both,
}

/// A configured action for a gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Action identifier, also the unqualified dispatch key.
    pub action: String,
    /// Human-readable description used in logs.
    pub description: String,
    pub hand: HandScope,
}

impl Command {
    pub fn new(action: &str, description: &str, hand: HandScope) -> Command {
        Command {
            action: action.to_owned(),
            description: description.to_owned(),
            hand,
        }
    }
}

/// Generic, left-only and right-only command tables.
#[derive(Debug, Clone, Default)]
pub struct CommandTables {
    generic: HashMap<GestureLabel, Command>,
    left: HashMap<GestureLabel, Command>,
    right: HashMap<GestureLabel, Command>,
}

impl CommandTables {
    /// Tables with no entries; every gesture resolves to nothing.
    pub fn empty() -> CommandTables {
        CommandTables::default()
    }

    /// Insert into the table picked by `command.hand`, replacing any earlier
    /// entry for the same gesture.
    pub fn insert(&mut self, gesture: GestureLabel, command: Command) {
        let table = match command.hand {
            HandScope::Both => &mut self.generic,
            HandScope::Left => &mut self.left,
            HandScope::Right => &mut self.right,
        };
        table.insert(gesture, command);
    }

    fn add(&mut self, gesture: GestureLabel, action: &str, description: &str, hand: HandScope) {
        self.insert(gesture, Command::new(action, description, hand));
    }

    /// Resolve the command for a gesture seen on a hand.
    ///
    /// The hand's own table shadows the generic one for that gesture. An
    /// unknown hand only ever sees the generic table.
    pub fn resolve(&self, gesture: GestureLabel, hand: HandSide) -> Option<&Command> {
        if gesture.is_none() {
            return None;
        }
        let specific = match hand {
            HandSide::Left => self.left.get(&gesture),
            HandSide::Right => self.right.get(&gesture),
            HandSide::Unknown => None,
        };
        specific.or_else(|| self.generic.get(&gesture))
    }

    /// All configured entries, generic first, for start-up logging.
    pub fn entries(&self) -> impl Iterator<Item = (GestureLabel, &Command)> {
        self.generic
            .iter()
            .chain(self.left.iter())
            .chain(self.right.iter())
            .map(|(gesture, command)| (*gesture, command))
    }

    /// Every distinct action name referenced by the tables.
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.entries().map(|(_, cmd)| cmd.action.as_str()).collect();
        actions.sort_unstable();
        actions.dedup();
        actions
    }
}

impl Default for HandScope {
    fn default() -> Self {
        HandScope::Both
    }
}

/// The stock lighting gesture set.
pub fn default_tables() -> CommandTables {
    use GestureLabel::*;
    use HandScope::*;

    let mut tables = CommandTables::empty();

    tables.add(Fist, "close_all", "Fist - turn every light off", Both);
    tables.add(OpenPalm, "open_all", "Open palm - turn every light on", Both);
    tables.add(Peace, "toggle_device", "Peace - toggle the first light", Both);
    tables.add(ThumbsUp, "increase_brightness", "Thumbs up - raise brightness", Both);
    tables.add(PointingUp, "max_brightness", "Pointing up - full brightness", Both);

    tables.add(ThumbsUp, "decrease_brightness", "Left thumbs up - lower brightness", Left);
    tables.add(PointingUp, "min_brightness", "Left pointing up - minimum brightness", Left);
    tables.add(ThreeFingers, "decrease_color_temp", "Left three fingers - warmer light", Left);
    tables.add(TwoFingers, "set_warm_color_temp", "Left two fingers - warm white", Left);

    tables.add(ThumbsUp, "increase_brightness", "Right thumbs up - raise brightness", Right);
    tables.add(PointingUp, "max_brightness", "Right pointing up - full brightness", Right);
    tables.add(ThreeFingers, "increase_color_temp", "Right three fingers - cooler light", Right);
    tables.add(TwoFingers, "set_cool_color_temp", "Right two fingers - cool white", Right);

    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(tables: &CommandTables, gesture: GestureLabel, hand: HandSide) -> Option<&str> {
        tables.resolve(gesture, hand).map(|cmd| cmd.action.as_str())
    }

    #[test]
    fn generic_only_gesture_is_shared_by_both_hands() {
        let tables = default_tables();
        assert_eq!(action(&tables, GestureLabel::OpenPalm, HandSide::Left), Some("open_all"));
        assert_eq!(action(&tables, GestureLabel::OpenPalm, HandSide::Right), Some("open_all"));
    }

    #[test]
    fn hand_specific_entry_shadows_generic() {
        let tables = default_tables();
        assert_eq!(action(&tables, GestureLabel::ThumbsUp, HandSide::Left), Some("decrease_brightness"));
        assert_eq!(action(&tables, GestureLabel::ThumbsUp, HandSide::Right), Some("increase_brightness"));
        assert_eq!(action(&tables, GestureLabel::ThumbsUp, HandSide::Unknown), Some("increase_brightness"));
    }

    #[test]
    fn opposite_hand_falls_back_to_generic() {
        let mut tables = CommandTables::empty();
        tables.add(GestureLabel::Peace, "generic_peace", "", HandScope::Both);
        tables.add(GestureLabel::Peace, "left_peace", "", HandScope::Left);

        assert_eq!(action(&tables, GestureLabel::Peace, HandSide::Left), Some("left_peace"));
        assert_eq!(action(&tables, GestureLabel::Peace, HandSide::Right), Some("generic_peace"));
    }

    #[test]
    fn unmapped_gestures_resolve_to_nothing() {
        let tables = default_tables();
        assert_eq!(action(&tables, GestureLabel::OneFinger, HandSide::Left), None);
        assert_eq!(action(&tables, GestureLabel::None, HandSide::Right), None);
        // Hand-only entries are not visible without a hand.
        assert_eq!(action(&tables, GestureLabel::TwoFingers, HandSide::Unknown), None);
    }

    #[test]
    fn action_list_is_deduplicated() {
        let tables = default_tables();
        let actions = tables.actions();
        assert_eq!(actions.len(), 11);
        assert!(actions.contains(&"set_cool_color_temp"));
    }
}
