//! `${VAR}` / `${VAR:default}` substitution against the process environment, applied to every
//! string leaf of the raw config JSON tree before it is deserialized into typed configuration.

use std::env;

/// Replaces every `${VAR}` / `${VAR:default}` placeholder in `input` with the corresponding
/// environment variable. A missing variable without a default substitutes the empty string and
/// logs a warning; this mirrors how the rest of substitution is "best effort, loud on gaps"
/// rather than fatal.
pub fn substitute(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c == '$' && input[i..].starts_with("${") {
            if let Some(end) = input[i..].find('}') {
                let placeholder = &input[i + 2..i + end];
                let (var_name, default) = match placeholder.split_once(':') {
                    Some((name, default)) => (name, Some(default)),
                    None => (placeholder, None),
                };
                let resolved = match env::var(var_name) {
                    Ok(v) => v,
                    Err(_) => match default {
                        Some(d) => d.to_string(),
                        None => {
                            tracing::warn!(variable = %var_name, "environment variable not set and no default given, substituting empty string");
                            String::new()
                        }
                    },
                };
                out.push_str(&resolved);
                for _ in 0..end {
                    chars.next();
                }
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Recursively applies `substitute` to every string value in a parsed JSON tree.
pub fn substitute_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) => *s = substitute(s),
        serde_json::Value::Array(arr) => arr.iter_mut().for_each(substitute_json),
        serde_json::Value::Object(map) => map.values_mut().for_each(substitute_json),
        _ => {}
    }
}

/// Resolves a chain's private key field per the special-cased `${PRIVATE_KEY}` rule: a leading
/// `0x` is added if missing, and a default of 64 zero hex characters is used (with a warning)
/// when the environment variable is absent.
pub fn resolve_private_key(raw: &str) -> String {
    if !raw.contains("${PRIVATE_KEY") {
        return raw.to_string();
    }
    let key = match env::var("PRIVATE_KEY") {
        Ok(v) => v,
        Err(_) => {
            tracing::warn!("PRIVATE_KEY is not set; using an all-zero placeholder key");
            "0".repeat(64)
        }
    };
    if key.starts_with("0x") {
        key
    } else {
        format!("0x{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_set_variable() {
        unsafe { env::set_var("RELAYER_TEST_VAR", "hello") };
        assert_eq!(substitute("prefix-${RELAYER_TEST_VAR}-suffix"), "prefix-hello-suffix");
        unsafe { env::remove_var("RELAYER_TEST_VAR") };
    }

    #[test]
    fn substitutes_default_when_missing() {
        unsafe { env::remove_var("RELAYER_TEST_MISSING") };
        assert_eq!(substitute("${RELAYER_TEST_MISSING:fallback}"), "fallback");
    }

    #[test]
    fn substitutes_empty_string_when_missing_and_no_default() {
        unsafe { env::remove_var("RELAYER_TEST_MISSING_2") };
        assert_eq!(substitute("${RELAYER_TEST_MISSING_2}"), "");
    }

    #[test]
    fn private_key_gets_0x_prefix_added() {
        unsafe { env::set_var("PRIVATE_KEY", "deadbeef") };
        assert_eq!(
            resolve_private_key("${PRIVATE_KEY}"),
            "0xdeadbeef".to_string()
        );
        unsafe { env::remove_var("PRIVATE_KEY") };
    }

    #[test]
    fn private_key_defaults_to_zero_fill_when_absent() {
        unsafe { env::remove_var("PRIVATE_KEY") };
        let resolved = resolve_private_key("${PRIVATE_KEY}");
        assert_eq!(resolved, format!("0x{}", "0".repeat(64)));
    }
}
