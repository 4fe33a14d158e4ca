use serde_json::{Number, Value};

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn integral(value: f64) -> Option<i64> {
    (value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER).then_some(value as i64)
}

pub fn number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Some(Value::String(raw)) => parse_decimal(raw),
        Some(Value::Bool(true)) => 1.0,
        _ => 0.0,
    }
}

fn parse_decimal(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    // f64::from_str also accepts "inf" and "NaN"; those are not counts.
    let plain = trimmed
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'));
    if !plain {
        return 0.0;
    }

    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Grouping key: a non-empty string, `true`, or a non-zero number. `3` and
/// `3.0` share the key `"3"`.
pub fn text_key(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Bool(true) => Some("true".to_string()),
        Value::Number(n) => {
            let v = n.as_f64().filter(|v| v.is_finite() && *v != 0.0)?;
            Some(integral(v).map_or_else(|| v.to_string(), |i| i.to_string()))
        }
        _ => None,
    }
}

pub fn number_value(value: f64) -> Value {
    match integral(value) {
        Some(i) => Value::from(i),
        None => Number::from_f64(value).map_or(Value::Null, Value::Number),
    }
}
