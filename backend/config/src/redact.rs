//! Safe-to-print config snapshots: secret fields are masked.

use serde_json::Value;

static SECRET_KEYS: &[&str] = &["botToken", "bot_token", "token", "secret", "password"];

fn is_secret_key(key: &str) -> bool {
    SECRET_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

/// Copy of `value` with every secret string replaced by a short hint.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) if is_secret_key(k) => Value::String(mask(s)),
                        other => redact(other),
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    // Bot tokens start with the public bot id; keep that much.
    match secret.split_once(':') {
        Some((id, _)) if id.chars().all(|c| c.is_ascii_digit()) => format!("{id}:***"),
        _ => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn masks_bot_token_keeps_rest() {
        let v = json!({"telegram": {"botToken": "123456:AAAbbbCCC", "adminId": 5}});
        let r = redact(&v);
        assert_eq!(r["telegram"]["botToken"], "123456:***");
        assert_eq!(r["telegram"]["adminId"], 5);
    }

    #[test]
    fn opaque_secret_fully_masked() {
        let r = redact(&json!({"password": "hunter2"}));
        assert_eq!(r["password"], "***");
    }
}
