use serde_json::Value;

/// Longest body excerpt written to request logs, in characters.
pub const MAX_LOGGED_BODY_CHARS: usize = 1024;

/// Masks buyer contact details and credentials in JSON payloads for logging
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = if is_sensitive_field(key) {
                    mask_value(val)
                } else {
                    sanitize_json(val)
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        _ => value.clone(),
    }
}

/// Sanitized, length-capped rendering of a raw request body.
pub fn loggable_body(bytes: &[u8]) -> String {
    let rendered = match serde_json::from_slice::<Value>(bytes) {
        Ok(json) => sanitize_json(&json).to_string(),
        Err(_) => format!("<{} bytes, not JSON>", bytes.len()),
    };

    if rendered.chars().count() > MAX_LOGGED_BODY_CHARS {
        let mut truncated: String = rendered.chars().take(MAX_LOGGED_BODY_CHARS).collect();
        truncated.push_str("...");
        truncated
    } else {
        rendered
    }
}

fn is_sensitive_field(key: &str) -> bool {
    let key = key.to_lowercase();
    ["email", "secret", "password", "token", "authorization"]
        .iter()
        .any(|needle| key.contains(needle))
        || key.ends_with("key")
}

fn mask_value(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > 8 => {
            let chars: Vec<char> = s.chars().collect();
            let visible: String = chars[..4].iter().collect();
            let end: String = chars[chars.len() - 4..].iter().collect();
            Value::String(format!("{}****{}", visible, end))
        }
        _ => Value::String("****".to_string()),
    }
}
