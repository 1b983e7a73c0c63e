//! Mouse, keyboard and screenshot control of an instance's display

use super::ToolDefinition;
use serde::{Deserialize, Serialize};

pub type Point = [i64; 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
}

impl MouseButton {
    fn title(&self) -> &'static str {
        match self {
            MouseButton::Left => "Left",
            MouseButton::Right => "Right",
            MouseButton::Middle => "Middle",
            MouseButton::Back => "Back",
            MouseButton::Forward => "Forward",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickType {
    #[default]
    Click,
    Down,
    Up,
}

impl ClickType {
    fn as_str(&self) -> &'static str {
        match self {
            ClickType::Click => "click",
            ClickType::Down => "down",
            ClickType::Up => "up",
        }
    }
}

/// One action of the computer tool, tagged by `action`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ComputerAction {
    MoveMouse {
        coordinates: Point,
    },
    ClickMouse {
        button: MouseButton,
        #[serde(default)]
        click_type: ClickType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coordinates: Option<Point>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        num_clicks: Option<u32>,
    },
    DragMouse {
        path: Vec<Point>,
    },
    Scroll {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coordinates: Option<Point>,
        #[serde(default)]
        delta_x: f64,
        #[serde(default)]
        delta_y: f64,
    },
    PressKey {
        keys: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
    TypeText {
        text: String,
    },
    Wait {
        duration: f64,
    },
    TakeScreenshot,
    GetCursorPosition,
}

impl ComputerAction {
    /// Human-readable one-liner for step logs
    pub fn describe(&self) -> String {
        let at = |c: &Option<Point>| {
            c.map(|[x, y]| format!(" at ({}, {})", x, y)).unwrap_or_default()
        };
        match self {
            ComputerAction::MoveMouse { coordinates: [x, y] } => {
                format!("Moving mouse to ({}, {})", x, y)
            }
            ComputerAction::ClickMouse { button, click_type, coordinates, num_clicks } => {
                let count = num_clicks.unwrap_or(1);
                let times = if count > 1 { format!("{}x ", count) } else { String::new() };
                format!("{}{} {}{}", times, button.title(), click_type.as_str(), at(coordinates))
            }
            ComputerAction::DragMouse { path } => match (path.first(), path.last()) {
                (Some([x0, y0]), Some([x1, y1])) => {
                    format!("Dragging mouse from ({}, {}) to ({}, {})", x0, y0, x1, y1)
                }
                _ => "Dragging mouse along an empty path".to_string(),
            },
            ComputerAction::Scroll { coordinates, delta_x, delta_y } => {
                let mut parts = Vec::new();
                if *delta_x != 0.0 {
                    parts.push(format!("horizontally by {}", delta_x));
                }
                if *delta_y != 0.0 {
                    parts.push(format!("vertically by {}", delta_y));
                }
                format!("Scrolling {}{}", parts.join(" and "), at(coordinates))
            }
            ComputerAction::PressKey { keys, duration } => {
                let held = duration.map(|d| format!(" for {}s", d)).unwrap_or_default();
                format!("Pressing {}{}", keys.join("+"), held)
            }
            ComputerAction::TypeText { text } => format!("Typing: {}", text),
            ComputerAction::Wait { duration } => format!("Waiting for {}s", duration),
            ComputerAction::TakeScreenshot => "Taking screenshot".to_string(),
            ComputerAction::GetCursorPosition => "Getting cursor position".to_string(),
        }
    }
}

pub fn definition() -> ToolDefinition {
    let point = serde_json::json!({
        "type": "array",
        "items": { "type": "integer" },
        "minItems": 2,
        "maxItems": 2
    });
    ToolDefinition::new(
        "computer",
        "Control the mouse and keyboard of the instance and take screenshots. \
         Coordinates are [x, y] pixels from the top-left corner of the screen.",
    )
    .with_parameters(serde_json::json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": [
                    "move_mouse", "click_mouse", "drag_mouse", "scroll", "press_key",
                    "type_text", "wait", "take_screenshot", "get_cursor_position"
                ]
            },
            "coordinates": point,
            "path": { "type": "array", "items": point },
            "button": { "type": "string", "enum": ["left", "right", "middle", "back", "forward"] },
            "click_type": { "type": "string", "enum": ["click", "down", "up"] },
            "num_clicks": { "type": "integer", "minimum": 1 },
            "delta_x": { "type": "number" },
            "delta_y": { "type": "number" },
            "keys": { "type": "array", "items": { "type": "string" } },
            "text": { "type": "string" },
            "duration": { "type": "number" }
        },
        "required": ["action"]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_click() {
        let action: ComputerAction = serde_json::from_value(json!({
            "action": "click_mouse",
            "button": "left",
            "coordinates": [10, 20],
            "num_clicks": 2
        }))
        .unwrap();

        assert_eq!(action.describe(), "2x Left click at (10, 20)");
    }

    #[test]
    fn test_describe_actions() {
        let scroll = ComputerAction::Scroll { coordinates: None, delta_x: 0.0, delta_y: 3.0 };
        assert_eq!(scroll.describe(), "Scrolling vertically by 3");

        let keys = ComputerAction::PressKey { keys: vec!["ctrl".into(), "l".into()], duration: None };
        assert_eq!(keys.describe(), "Pressing ctrl+l");

        let drag = ComputerAction::DragMouse { path: vec![[0, 0], [5, 5], [9, 1]] };
        assert_eq!(drag.describe(), "Dragging mouse from (0, 0) to (9, 1)");
    }

    #[test]
    fn test_screenshot_serializes_bare() {
        let value = serde_json::to_value(ComputerAction::TakeScreenshot).unwrap();
        assert_eq!(value, json!({"action": "take_screenshot"}));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let result = serde_json::from_value::<ComputerAction>(json!({"action": "teleport"}));
        assert!(result.is_err());
    }
}
