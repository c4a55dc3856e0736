//! Terminal color theme.
//!
//! Themes come from a loosely typed table in the config file. Keys are
//! matched against a fixed slot table; anything else is ignored.

use serde::Serialize;
use serde_json::{Map, Value};

/// 20 color slots understood by the browser terminal. Empty means "use the
/// terminal's default" and is left out of the serialized form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub foreground: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub background: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub selection_foreground: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub selection_background: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub black: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bright_black: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub red: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bright_red: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub yellow: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bright_yellow: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub green: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bright_green: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub blue: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bright_blue: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub magenta: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bright_magenta: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cyan: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bright_cyan: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub white: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bright_white: String,
}

/// Config keys naming the theme slots.
pub const SLOT_NAMES: [&str; 20] = [
    "foreground",
    "background",
    "selection-foreground",
    "selection-background",
    "black",
    "bright-black",
    "red",
    "bright-red",
    "yellow",
    "bright-yellow",
    "green",
    "bright-green",
    "blue",
    "bright-blue",
    "magenta",
    "bright-magenta",
    "cyan",
    "bright-cyan",
    "white",
    "bright-white",
];

/// Why a theme entry was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeKeyIssue {
    UnknownKey(String),
    NotAString(String),
}

impl Theme {
    /// Set a single slot. Keys are case-insensitive and accept `-` or `_`.
    /// Returns false if the key names no slot.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        match self.slot_mut(&key.to_ascii_lowercase().replace('_', "-")) {
            Some(slot) => {
                *slot = value.to_string();
                true
            }
            None => false,
        }
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut String> {
        let slot = match name {
            "foreground" => &mut self.foreground,
            "background" => &mut self.background,
            "selection-foreground" => &mut self.selection_foreground,
            "selection-background" => &mut self.selection_background,
            "black" => &mut self.black,
            "bright-black" => &mut self.bright_black,
            "red" => &mut self.red,
            "bright-red" => &mut self.bright_red,
            "yellow" => &mut self.yellow,
            "bright-yellow" => &mut self.bright_yellow,
            "green" => &mut self.green,
            "bright-green" => &mut self.bright_green,
            "blue" => &mut self.blue,
            "bright-blue" => &mut self.bright_blue,
            "magenta" => &mut self.magenta,
            "bright-magenta" => &mut self.bright_magenta,
            "cyan" => &mut self.cyan,
            "bright-cyan" => &mut self.bright_cyan,
            "white" => &mut self.white,
            "bright-white" => &mut self.bright_white,
            _ => return None,
        };
        Some(slot)
    }

    /// Apply every recognized string entry of `map`, returning the entries
    /// that were skipped.
    pub fn apply_map(&mut self, map: &Map<String, Value>) -> Vec<ThemeKeyIssue> {
        let mut issues = Vec::new();
        for (key, value) in map {
            match value.as_str() {
                Some(s) => {
                    if !self.set(key, s) {
                        issues.push(ThemeKeyIssue::UnknownKey(key.clone()));
                    }
                }
                None => issues.push(ThemeKeyIssue::NotAString(key.clone())),
            }
        }
        issues
    }

    /// Whether no slot has been set.
    pub fn is_empty(&self) -> bool {
        *self == Theme::default()
    }
}
