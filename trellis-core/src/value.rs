//! Helpers over template values.
//!
//! Template expressions produce [`serde_json::Value`]s. These functions give
//! them the loose semantics templates expect: truthiness, display text, key
//! strings and dotted-path access.

pub use serde_json::Value;

use serde_json::Map;

/// Truthiness as templates see it.
///
/// `null`, `false`, `0`, `NaN` and `""` are false. Arrays and objects are
/// true even when empty.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text shown for a value inside an interpolation.
///
/// `null` renders as nothing, strings render raw and everything else renders
/// as compact JSON.
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(n),
        other => other.to_string(),
    }
}

/// String form of a list key.
pub fn key_string(value: &Value) -> String {
    display(value)
}

fn format_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

/// Build a number value, keeping integers integral.
pub fn number(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Split a dotted path (`user.address.city`, `rows.0`) into segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('.').map(str::trim).collect()
}

/// Index into `value` by one path segment.
pub fn member<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Follow `segments` from `value`. Missing members yield `None`.
pub fn get_path<'a>(value: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(value, |current, segment| member(current, segment))
}

/// Write `new_value` at `segments` below `value`, creating objects on the way.
///
/// Returns `false` when an intermediate value is a scalar that cannot hold
/// members.
pub fn set_path(value: &mut Value, segments: &[&str], new_value: Value) -> bool {
    let Some((last, parents)) = segments.split_last() else {
        *value = new_value;
        return true;
    };

    let mut current = value;
    for segment in parents {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map
                .entry((*segment).to_string())
                .or_insert(Value::Null),
            Value::Array(items) => match segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                Some(item) => item,
                None => return false,
            },
            _ => return false,
        };
    }

    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Object(map) => {
            map.insert((*last).to_string(), new_value);
            true
        }
        Value::Array(items) => match last.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            Some(item) => {
                *item = new_value;
                true
            }
            None => false,
        },
        _ => false,
    }
}

/// Render a `class` binding value: strings pass through, arrays join their
/// truthy entries, objects join the keys whose values are truthy.
pub fn class_list(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => Some(
            map.iter()
                .filter(|(_, enabled)| truthy(enabled))
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        ),
        Value::Array(items) => Some(
            items
                .iter()
                .filter(|item| truthy(item))
                .map(display)
                .collect::<Vec<_>>()
                .join(" "),
        ),
        _ => None,
    }
}

/// Render a `style` binding object as `name: value;` pairs.
pub fn style_text(value: &Value) -> Option<String> {
    let Value::Object(map) = value else {
        return None;
    };
    Some(
        map.iter()
            .filter(|(_, v)| !v.is_null() && *v != &Value::Bool(false))
            .map(|(name, v)| format!("{}: {};", name, display(v)))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!([])));
        assert!(truthy(&json!({})));
        assert!(truthy(&json!(-1.5)));
    }

    #[test]
    fn display_renders_scalars_raw() {
        assert_eq!(display(&json!(null)), "");
        assert_eq!(display(&json!("hi")), "hi");
        assert_eq!(display(&json!(3)), "3");
        assert_eq!(display(&json!(3.0)), "3");
        assert_eq!(display(&json!(2.5)), "2.5");
        assert_eq!(display(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn path_access() {
        let data = json!({"user": {"tags": ["a", "b"]}});
        assert_eq!(get_path(&data, &["user", "tags", "1"]), Some(&json!("b")));
        assert_eq!(get_path(&data, &["user", "missing"]), None);
    }

    #[test]
    fn set_path_creates_objects() {
        let mut data = json!(null);
        assert!(set_path(&mut data, &["a", "b"], json!(1)));
        assert_eq!(data, json!({"a": {"b": 1}}));

        let mut scalar = json!({"a": 1});
        assert!(!set_path(&mut scalar, &["a", "b"], json!(2)));
    }

    #[test]
    fn class_and_style_objects() {
        let classes = json!({"active": true, "hidden": false, "big": 1});
        assert_eq!(class_list(&classes).as_deref(), Some("active big"));

        let style = json!({"color": "red", "width": null});
        assert_eq!(style_text(&style).as_deref(), Some("color: red;"));
    }
}
