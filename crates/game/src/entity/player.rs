use crate::replication::{Field, ValueError, WireValue, expect_text};

pub const DEFAULT_PLAYER_NAME: &str = "Player";
pub const MAX_NAME_LEN: usize = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub name: String,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            name: DEFAULT_PLAYER_NAME.to_string(),
        }
    }
}

impl Player {
    pub fn new(name: &str) -> Self {
        let mut player = Self::default();
        player.rename(name);
        player
    }

    /// Trims and truncates; a blank name keeps the current one.
    pub fn rename(&mut self, name: &str) -> bool {
        let name: String = name.trim().chars().take(MAX_NAME_LEN).collect();
        if name.is_empty() || name == self.name {
            return false;
        }
        self.name = name;
        true
    }

    pub fn read(&self, field: Field) -> Option<WireValue> {
        match field {
            Field::Name => Some(WireValue::Text(self.name.clone())),
            _ => None,
        }
    }

    pub fn write(&mut self, field: Field, value: &WireValue) -> Result<(), ValueError> {
        match field {
            Field::Name => self.name = expect_text(value)?.to_string(),
            _ => return Err(ValueError::NotCarried(field)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_trims_and_limits() {
        let mut p = Player::default();
        assert!(p.rename("  ace  "));
        assert_eq!(p.name, "ace");
        assert!(!p.rename("   "));
        assert_eq!(p.name, "ace");
        p.rename(&"x".repeat(100));
        assert_eq!(p.name.len(), MAX_NAME_LEN);
    }
}
