//! Synthetic key presses for corrective actions.
//!
//! Uses `enigo` for cross-platform input simulation.

use enigo::{Direction, Enigo, Key, Keyboard, Mouse, Settings};
use tracing::{debug, info};

use crate::models::keys::KeyName;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to initialize input controller: {0}")]
    Init(String),
    #[error("Unsupported key name '{0}'")]
    UnknownKey(String),
    #[error("Failed to send key '{key}': {reason}")]
    Send { key: String, reason: String },
}

/// Capability that performs the actual key press for a decided action
pub trait ActionDispatcher {
    fn press(&mut self, key: &str) -> Result<(), DispatchError>;

    /// Whether the user asked for an emergency stop through the input devices
    fn failsafe_tripped(&self) -> bool {
        false
    }
}

/// Map a config key name to an enigo key
///
/// Accepts function keys, a handful of named keys and single characters.
pub fn parse_key(name: &str) -> Option<Key> {
    let key = match KeyName::parse(name)? {
        KeyName::Function(n) => match n {
            1 => Key::F1,
            2 => Key::F2,
            3 => Key::F3,
            4 => Key::F4,
            5 => Key::F5,
            6 => Key::F6,
            7 => Key::F7,
            8 => Key::F8,
            9 => Key::F9,
            10 => Key::F10,
            11 => Key::F11,
            12 => Key::F12,
            _ => return None,
        },
        KeyName::Space => Key::Space,
        KeyName::Return => Key::Return,
        KeyName::Tab => Key::Tab,
        KeyName::Escape => Key::Escape,
        KeyName::Shift => Key::Shift,
        KeyName::Control => Key::Control,
        KeyName::Alt => Key::Alt,
        KeyName::Home => Key::Home,
        KeyName::End => Key::End,
        KeyName::PageUp => Key::PageUp,
        KeyName::PageDown => Key::PageDown,
        #[cfg(not(target_os = "macos"))]
        KeyName::Insert => Key::Insert,
        // enigo has no Insert key on macOS
        #[cfg(target_os = "macos")]
        KeyName::Insert => return None,
        KeyName::Delete => Key::Delete,
        KeyName::Char(c) => Key::Unicode(c),
    };
    Some(key)
}

/// Presses real keys through the OS input layer
pub struct KeyboardDispatcher {
    enigo: Enigo,
}

impl KeyboardDispatcher {
    pub fn new() -> Result<Self, DispatchError> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| DispatchError::Init(format!("{:?}", e)))?;
        Ok(Self { enigo })
    }
}

impl ActionDispatcher for KeyboardDispatcher {
    fn press(&mut self, key: &str) -> Result<(), DispatchError> {
        let parsed = parse_key(key).ok_or_else(|| DispatchError::UnknownKey(key.to_string()))?;
        self.enigo
            .key(parsed, Direction::Click)
            .map_err(|e| DispatchError::Send {
                key: key.to_string(),
                reason: format!("{:?}", e),
            })?;
        debug!("Pressed {}", key);
        Ok(())
    }

    /// Trips when the cursor is parked in the top-left screen corner
    fn failsafe_tripped(&self) -> bool {
        matches!(self.enigo.location(), Ok((0, 0)))
    }
}

/// Records presses instead of sending them
#[derive(Debug, Default)]
pub struct DryRunDispatcher {
    presses: Vec<String>,
}

impl DryRunDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presses(&self) -> &[String] {
        &self.presses
    }
}

impl ActionDispatcher for DryRunDispatcher {
    fn press(&mut self, key: &str) -> Result<(), DispatchError> {
        if parse_key(key).is_none() {
            return Err(DispatchError::UnknownKey(key.to_string()));
        }
        info!("[dry-run] would press {}", key);
        self.presses.push(key.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_function_keys() {
        assert_eq!(parse_key("f1"), Some(Key::F1));
        assert_eq!(parse_key("F6"), Some(Key::F6));
        assert_eq!(parse_key(" f12 "), Some(Key::F12));
        assert_eq!(parse_key("f13"), None);
    }

    #[test]
    fn test_parse_named_keys_and_aliases() {
        assert_eq!(parse_key("esc"), parse_key("escape"));
        assert_eq!(parse_key("pup"), Some(Key::PageUp));
        assert_eq!(parse_key("pdn"), Some(Key::PageDown));
        assert_eq!(parse_key("del"), Some(Key::Delete));
        assert_eq!(parse_key("Space"), Some(Key::Space));
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_parse_insert() {
        assert_eq!(parse_key("ins"), Some(Key::Insert));
    }

    #[test]
    fn test_parse_single_character() {
        assert_eq!(parse_key("q"), Some(Key::Unicode('q')));
        assert_eq!(parse_key("Q"), Some(Key::Unicode('q')));
        assert_eq!(parse_key("1"), Some(Key::Unicode('1')));
    }

    #[test]
    fn test_parse_rejects_unknown_names() {
        assert_eq!(parse_key(""), None);
        assert_eq!(parse_key("hyperkey"), None);
    }

    #[test]
    fn test_dry_run_records_presses() {
        let mut dispatcher = DryRunDispatcher::new();
        dispatcher.press("f2").unwrap();
        dispatcher.press("f1").unwrap();

        assert_eq!(dispatcher.presses(), &["f2".to_string(), "f1".to_string()]);
        assert!(!dispatcher.failsafe_tripped());
    }

    #[test]
    fn test_dry_run_rejects_unknown_key() {
        let mut dispatcher = DryRunDispatcher::new();
        let err = dispatcher.press("nope").unwrap_err();

        assert!(matches!(err, DispatchError::UnknownKey(ref k) if k == "nope"));
        assert!(dispatcher.presses().is_empty());
    }
}
