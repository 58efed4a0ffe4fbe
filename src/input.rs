//! Input events understood by the engine.
//!
//! Positions are in screen pixels relative to the canvas. [`InputEvent`] is
//! the serialized form used by replay scripts.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::model::LabelId;
use crate::tool::Tool;

/// Mouse buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    #[default]
    Left,
    Middle,
    Right,
}

/// Modifier keys held during a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const CTRL: Modifiers = Modifiers {
        shift: false,
        ctrl: true,
        alt: false,
        meta: false,
    };

    /// Modifier that turns an outline click into point insertion.
    pub fn add_point(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// A pointer press, move or release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub position: Point,
    pub button: PointerButton,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    /// Left button, no modifiers.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            position: Point::new(x, y),
            button: PointerButton::Left,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_button(mut self, button: PointerButton) -> Self {
        self.button = button;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Keys the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Key {
    Escape,
    /// Held to pan with the left button.
    Space,
    Char(char),
}

/// Tool hotkeys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub tool_select: char,
    pub tool_rectangle: char,
    pub tool_polygon: char,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            tool_select: 's',
            tool_rectangle: 'e',
            tool_polygon: 'r',
        }
    }
}

impl KeyBindings {
    /// Tool bound to `c`, case-insensitively.
    pub fn tool_for(&self, c: char) -> Option<Tool> {
        let c = c.to_ascii_lowercase();
        if c == self.tool_select {
            Some(Tool::Select)
        } else if c == self.tool_rectangle {
            Some(Tool::Rectangle)
        } else if c == self.tool_polygon {
            Some(Tool::Polygon)
        } else {
            None
        }
    }
}

/// One step of a replay script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InputEvent {
    PointerDown {
        x: f64,
        y: f64,
        #[serde(default)]
        button: PointerButton,
        #[serde(default)]
        modifiers: Modifiers,
    },
    PointerMove {
        x: f64,
        y: f64,
    },
    PointerUp {
        x: f64,
        y: f64,
        #[serde(default)]
        button: PointerButton,
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// Press and release at the same spot.
    Click {
        x: f64,
        y: f64,
        #[serde(default)]
        modifiers: Modifiers,
    },
    DoubleClick {
        x: f64,
        y: f64,
    },
    Wheel {
        delta: f64,
        x: f64,
        y: f64,
    },
    KeyDown {
        key: Key,
    },
    KeyUp {
        key: Key,
    },
    SetTool {
        tool: Tool,
    },
    SetActiveLabel {
        label: Option<LabelId>,
    },
    /// Pointer entered or left the hover tooltip.
    TooltipHover {
        hovered: bool,
    },
    ZoomIn,
    ZoomOut,
    ResetView,
    /// Render one frame.
    Frame,
    /// Advance the clock and fire due timers.
    Wait {
        ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script_events() {
        let json = r#"[
            {"event": "set_tool", "tool": "rectangle"},
            {"event": "click", "x": 10, "y": 10},
            {"event": "pointer_down", "x": 5, "y": 6, "modifiers": {"shift": true}},
            {"event": "key_down", "key": "escape"},
            {"event": "key_down", "key": {"char": "r"}},
            {"event": "wait", "ms": 200},
            {"event": "zoom_in"}
        ]"#;
        let events: Vec<InputEvent> = serde_json::from_str(json).unwrap();
        assert_eq!(events.len(), 7);
        assert_eq!(events[0], InputEvent::SetTool { tool: Tool::Rectangle });
        assert_eq!(
            events[2],
            InputEvent::PointerDown {
                x: 5.0,
                y: 6.0,
                button: PointerButton::Left,
                modifiers: Modifiers::SHIFT,
            }
        );
        assert_eq!(events[4], InputEvent::KeyDown { key: Key::Char('r') });
        assert_eq!(events[6], InputEvent::ZoomIn);
    }

    #[test]
    fn test_key_bindings() {
        let bindings = KeyBindings::default();
        assert_eq!(bindings.tool_for('E'), Some(Tool::Rectangle));
        assert_eq!(bindings.tool_for('r'), Some(Tool::Polygon));
        assert_eq!(bindings.tool_for('x'), None);
    }
}
