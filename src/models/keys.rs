use serde::Serialize;

/// A key name accepted in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyName {
    /// Function key F1-F12
    Function(u8),
    Space,
    Return,
    Tab,
    Escape,
    Shift,
    Control,
    Alt,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    /// Single character, lowercased
    Char(char),
}

impl KeyName {
    /// Parse a config key name, case-insensitive
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        let key = match name.as_str() {
            "space" => KeyName::Space,
            "enter" | "return" => KeyName::Return,
            "tab" => KeyName::Tab,
            "esc" | "escape" => KeyName::Escape,
            "shift" => KeyName::Shift,
            "ctrl" | "control" => KeyName::Control,
            "alt" => KeyName::Alt,
            "home" => KeyName::Home,
            "end" => KeyName::End,
            "pageup" | "pup" => KeyName::PageUp,
            "pagedown" | "pdn" => KeyName::PageDown,
            "insert" | "ins" => KeyName::Insert,
            "delete" | "del" => KeyName::Delete,
            other => {
                if let Some(n) = other.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                    return (1..=12).contains(&n).then_some(KeyName::Function(n));
                }
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => KeyName::Char(c),
                    _ => return None,
                }
            }
        };
        Some(key)
    }

    pub fn is_supported(name: &str) -> bool {
        Self::parse(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_keys() {
        assert_eq!(KeyName::parse("f1"), Some(KeyName::Function(1)));
        assert_eq!(KeyName::parse(" F12 "), Some(KeyName::Function(12)));
        assert_eq!(KeyName::parse("f0"), None);
        assert_eq!(KeyName::parse("f13"), None);
    }

    #[test]
    fn test_aliases() {
        assert_eq!(KeyName::parse("esc"), KeyName::parse("Escape"));
        assert_eq!(KeyName::parse("pup"), Some(KeyName::PageUp));
        assert_eq!(KeyName::parse("ins"), Some(KeyName::Insert));
        assert_eq!(KeyName::parse("return"), Some(KeyName::Return));
    }

    #[test]
    fn test_single_characters() {
        assert_eq!(KeyName::parse("Q"), Some(KeyName::Char('q')));
        // A lone "f" is a character, not a function key
        assert_eq!(KeyName::parse("f"), Some(KeyName::Char('f')));
        assert!(!KeyName::is_supported(""));
        assert!(!KeyName::is_supported("hyperkey"));
    }
}
