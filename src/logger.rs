use std::time::Duration;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Initializes the global tracing subscriber.
///
/// `json` selects structured JSON output (production-like environments);
/// otherwise a human-readable pretty format is used for local runs.
/// `default_level` (e.g. `LOG_LEVEL`) seeds the filter when `RUST_LOG` is
/// unset.
pub fn init_tracing(json: bool, default_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    let base = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(base.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(base.pretty())
            .init();
    }
}

/// Runs `fut`, logging a warning if it takes longer than `max`.
pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = std::time::Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}

/// Scrubbing sensitive values out of structures before they are serialized
/// into a log line (spec §6).
pub mod redact {
    use serde_json::Value;

    const SENSITIVE_SUBSTRINGS: &[&str] = &[
        "token",
        "authorization",
        "password",
        "secret",
        "refresh",
        "access",
        "clientsecret",
    ];

    const MAX_STRING_LEN: usize = 500;
    const MAX_LIST_LEN: usize = 20;
    const MAX_MAP_ENTRIES: usize = 50;
    const MAX_DEPTH: usize = 4;

    fn is_sensitive_key(key: &str) -> bool {
        let lower = key.to_ascii_lowercase();
        SENSITIVE_SUBSTRINGS.iter().any(|p| lower.contains(p))
    }

    /// Scrubs a JSON value for safe logging: sensitive map keys become
    /// `"***"`, strings are truncated to 500 chars, lists to 20 elements
    /// (with a `[+K more]` marker appended), maps to 50 entries, and
    /// recursion is capped at depth 4 (replaced with `"[max-depth]"`).
    pub fn scrub(value: &Value) -> Value {
        scrub_at_depth(value, 0)
    }

    fn scrub_at_depth(value: &Value, depth: usize) -> Value {
        if depth >= MAX_DEPTH {
            return Value::String("[max-depth]".to_string());
        }

        match value {
            Value::String(s) => Value::String(truncate_string(s)),
            Value::Array(items) => {
                let mut out: Vec<Value> = items
                    .iter()
                    .take(MAX_LIST_LEN)
                    .map(|v| scrub_at_depth(v, depth + 1))
                    .collect();
                if items.len() > MAX_LIST_LEN {
                    out.push(Value::String(format!(
                        "[+{} more]",
                        items.len() - MAX_LIST_LEN
                    )));
                }
                Value::Array(out)
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map.iter().take(MAX_MAP_ENTRIES) {
                    if is_sensitive_key(k) {
                        out.insert(k.clone(), Value::String("***".to_string()));
                    } else {
                        out.insert(k.clone(), scrub_at_depth(v, depth + 1));
                    }
                }
                if map.len() > MAX_MAP_ENTRIES {
                    out.insert(
                        "__truncated__".to_string(),
                        Value::String(format!("[+{} more]", map.len() - MAX_MAP_ENTRIES)),
                    );
                }
                Value::Object(out)
            }
            other => other.clone(),
        }
    }

    fn truncate_string(s: &str) -> String {
        if s.chars().count() > MAX_STRING_LEN {
            s.chars().take(MAX_STRING_LEN).collect()
        } else {
            s.to_string()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serde_json::json;

        #[test]
        fn sensitive_keys_are_redacted_at_any_depth() {
            let v = json!({
                "refresh_token": "super-secret",
                "nested": {
                    "password": "hunter2",
                    "ok": "fine",
                }
            });
            let scrubbed = scrub(&v);
            assert_eq!(scrubbed["refresh_token"], json!("***"));
            assert_eq!(scrubbed["nested"]["password"], json!("***"));
            assert_eq!(scrubbed["nested"]["ok"], json!("fine"));
        }

        #[test]
        fn key_matching_is_case_insensitive_substring() {
            let v = json!({"Authorization": "Bearer xyz", "ClientSecret": "abc"});
            let scrubbed = scrub(&v);
            assert_eq!(scrubbed["Authorization"], json!("***"));
            assert_eq!(scrubbed["ClientSecret"], json!("***"));
        }

        #[test]
        fn long_strings_are_truncated() {
            let long = "a".repeat(600);
            let scrubbed = scrub(&json!(long));
            assert_eq!(scrubbed.as_str().unwrap().len(), 500);
        }

        #[test]
        fn long_lists_get_truncation_marker() {
            let items: Vec<i32> = (0..30).collect();
            let scrubbed = scrub(&json!(items));
            let arr = scrubbed.as_array().unwrap();
            assert_eq!(arr.len(), 21);
            assert_eq!(arr[20], json!("[+10 more]"));
        }

        #[test]
        fn recursion_is_capped_at_depth_four() {
            let v = json!({"a": {"b": {"c": {"d": {"e": "too-deep"}}}}});
            let scrubbed = scrub(&v);
            assert_eq!(scrubbed["a"]["b"]["c"]["d"], json!("[max-depth]"));
        }
    }
}
