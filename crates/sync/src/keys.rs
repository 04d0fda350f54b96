use std::fmt;
use std::str::FromStr;

use crate::config::SessionConfig;
use crate::error::ConfigError;

/// A key combination such as `CTRL SHIFT Z`.
///
/// Parsed from space-separated tokens: any of `CTRL`/`CONTROL`, `SHIFT`,
/// `ALT`, `META`, followed by exactly one key. Case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
    pub key: String,
}

impl KeyChord {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut chord = KeyChord {
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
            key: String::new(),
        };
        for token in text.split_whitespace() {
            let token = token.to_ascii_uppercase();
            let flag = match token.as_str() {
                "CTRL" | "CONTROL" => &mut chord.ctrl,
                "SHIFT" => &mut chord.shift,
                "ALT" => &mut chord.alt,
                "META" => &mut chord.meta,
                _ => {
                    if !chord.key.is_empty() {
                        return Err(ConfigError::InvalidChord(text.to_string()));
                    }
                    chord.key.push_str(&token);
                    continue;
                }
            };
            if *flag {
                return Err(ConfigError::InvalidChord(text.to_string()));
            }
            *flag = true;
        }
        if chord.key.is_empty() {
            return Err(ConfigError::InvalidChord(text.to_string()));
        }
        Ok(chord)
    }
}

impl FromStr for KeyChord {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (on, name) in [
            (self.ctrl, "CTRL "),
            (self.shift, "SHIFT "),
            (self.alt, "ALT "),
            (self.meta, "META "),
        ] {
            if on {
                f.write_str(name)?;
            }
        }
        f.write_str(&self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryCommand {
    Undo,
    Redo,
}

/// Chords mapped to history commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindings {
    undo: Vec<KeyChord>,
    redo: Vec<KeyChord>,
}

impl KeyBindings {
    pub fn from_config(config: &SessionConfig) -> Result<Self, ConfigError> {
        let parse_all = |chords: &[String]| {
            chords
                .iter()
                .map(|c| KeyChord::parse(c))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            undo: parse_all(&config.undo_keys)?,
            redo: parse_all(&config.redo_keys)?,
        })
    }

    pub fn command_for(&self, chord: &KeyChord) -> Option<HistoryCommand> {
        if self.undo.contains(chord) {
            Some(HistoryCommand::Undo)
        } else if self.redo.contains(chord) {
            Some(HistoryCommand::Redo)
        } else {
            None
        }
    }
}
