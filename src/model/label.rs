//! Label data model.

use serde::{Deserialize, Serialize};

/// Identifier for a label.
pub type LabelId = u32;

/// Color used when a label's hex string cannot be parsed.
const FALLBACK_RGB: [u8; 3] = [128, 128, 128];

/// An annotation label with a name and color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: LabelId,
    pub name: String,
    /// Hex color string such as `#ff8800`.
    pub color: String,
    /// Epoch milliseconds.
    #[serde(default)]
    pub created_at: u64,
}

impl Label {
    /// Create a new label with the given ID, name, and hex color.
    pub fn new(id: LabelId, name: &str, color: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            color: color.to_string(),
            created_at: super::now_millis(),
        }
    }

    /// Parse the hex color into RGB. Accepts `#rgb` and `#rrggbb`, with or
    /// without the leading `#`.
    pub fn rgb(&self) -> [u8; 3] {
        parse_hex_color(&self.color).unwrap_or(FALLBACK_RGB)
    }
}

fn parse_hex_color(hex: &str) -> Option<[u8; 3]> {
    let hex = hex.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some([r, g, b])
        }
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                rgb[i] = v * 17;
            }
            Some(rgb)
        }
        _ => None,
    }
}
