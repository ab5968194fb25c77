use serde_json::{Map, Value};

use super::{ChordKey, MacroStep, MouseButton, NamedKey};

impl From<Value> for MacroStep {
    fn from(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return MacroStep::Unknown { kind: None };
        };
        let kind = fields.get("type").map(json_value_to_string);

        match kind.as_deref() {
            Some("MOUSE_MOVE") => MacroStep::MoveRelative {
                dx: int_field(&fields, "dx"),
                dy: int_field(&fields, "dy"),
            },
            Some("MOUSE_MOVE_TO") => MacroStep::MoveAbsolute {
                x: int_field(&fields, "x"),
                y: int_field(&fields, "y"),
            },
            Some("MOUSE_CLICK") => MacroStep::Click {
                button: match str_field(&fields, "button") {
                    Some(b) if b.eq_ignore_ascii_case("RIGHT") => MouseButton::Right,
                    _ => MouseButton::Left,
                },
                count: count_field(&fields, "count"),
            },
            Some("TYPE_TEXT") => MacroStep::TypeText {
                text: str_field(&fields, "text").unwrap_or_default(),
            },
            Some("WAIT_MS") => MacroStep::Wait {
                ms: int_field(&fields, "ms").max(0) as u64,
            },
            Some("CTRL_KEY") => MacroStep::ChordCtrl {
                key: str_field(&fields, "key").and_then(|k| parse_chord_key(&k)),
            },
            Some("PRESS_KEY") => MacroStep::PressKey {
                key: str_field(&fields, "key").and_then(|k| parse_named_key(&k)),
            },
            Some("OPEN_URL") => MacroStep::OpenUrl {
                url: str_field(&fields, "url").unwrap_or_default(),
            },
            Some("REPEAT") => MacroStep::Repeat {
                count: count_field(&fields, "count"),
                steps: match fields.remove("steps") {
                    Some(Value::Array(items)) => items.into_iter().map(MacroStep::from).collect(),
                    _ => Vec::new(),
                },
            },
            _ => MacroStep::Unknown { kind },
        }
    }
}

fn parse_chord_key(key: &str) -> Option<ChordKey> {
    match key.trim().to_ascii_uppercase().as_str() {
        "A" => Some(ChordKey::A),
        "C" => Some(ChordKey::C),
        "V" => Some(ChordKey::V),
        _ => None,
    }
}

fn parse_named_key(key: &str) -> Option<NamedKey> {
    match key.trim().to_ascii_uppercase().as_str() {
        "ENTER" => Some(NamedKey::Enter),
        "ESCAPE" => Some(NamedKey::Escape),
        "CTRL_L" => Some(NamedKey::CtrlL),
        _ => None,
    }
}

fn str_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::Null => None,
        v => Some(json_value_to_string(v)),
    }
}

/// Read an integer leniently: numbers are truncated, numeric strings parsed,
/// everything else (including a missing field) is `0`.
fn int_field(fields: &Map<String, Value>, name: &str) -> i32 {
    match fields.get(name) {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(saturate)
            .or_else(|| n.as_f64().map(|f| f as i32))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<i32>().unwrap_or(0),
        _ => 0,
    }
}

fn count_field(fields: &Map<String, Value>, name: &str) -> u32 {
    int_field(fields, name).max(1) as u32
}

fn saturate(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Strings are returned as-is; other values are rendered as compact JSON.
fn json_value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
