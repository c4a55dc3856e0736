//! Terminal geometry reported by the browser.

use serde::Serialize;

pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;

/// Column and row counts of a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub cols: u16,
    pub rows: u16,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
        }
    }
}

impl Geometry {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Build a geometry from raw request parameters. Each dimension that is
    /// missing, unparsable, zero or out of range falls back on its own.
    pub fn from_params(cols: Option<&str>, rows: Option<&str>) -> Self {
        Self {
            cols: parse_dimension(cols).unwrap_or(DEFAULT_COLS),
            rows: parse_dimension(rows).unwrap_or(DEFAULT_ROWS),
        }
    }
}

fn parse_dimension(raw: Option<&str>) -> Option<u16> {
    raw?.trim().parse::<u16>().ok().filter(|n| *n > 0)
}
