//! Browser-side terminal settings passed unchanged into every rendered page.

use crate::theme::Theme;
use serde::Serialize;

pub const DEFAULT_ROWS: u16 = 24;
pub const DEFAULT_FONT_FAMILY: &str = "monospace";
pub const DEFAULT_FONT_SIZE: u16 = 14;

/// Terminal appearance for the browser client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub rows: u16,
    /// Zero fits the terminal to the browser window.
    pub columns: u16,
    pub cursor_blink: bool,
    pub font_family: String,
    pub font_size: u16,
    pub theme: Theme,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            columns: 0,
            cursor_blink: true,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            theme: Theme::default(),
        }
    }
}

impl ClientConfig {
    /// Whether the page should size the terminal to its window.
    pub fn fits_window(&self) -> bool {
        self.columns == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let client = ClientConfig::default();
        assert_eq!(client.rows, 24);
        assert_eq!(client.font_family, "monospace");
        assert_eq!(client.font_size, 14);
        assert!(client.cursor_blink);
        assert!(client.fits_window());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(ClientConfig::default()).unwrap();
        assert_eq!(json["cursorBlink"], true);
        assert_eq!(json["fontFamily"], "monospace");
        assert_eq!(json["theme"], serde_json::json!({}));
    }
}
