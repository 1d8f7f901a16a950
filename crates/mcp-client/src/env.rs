//! Resolves `${NAME}` placeholders in a tool server's configured env map
//! against the supervisor's own process environment (spec §4.3). A
//! placeholder that cannot be resolved never panics the supervisor: it
//! surfaces as a boot failure for that one server (`last_error =
//! "unresolved_env:NAME"`), leaving the rest of the fleet unaffected.

use std::collections::HashMap;

/// Error returned when one or more `${NAME}` placeholders in a server's
/// configured env could not be resolved from the host environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedEnvError {
    pub var_name: String,
}

impl UnresolvedEnvError {
    /// Formats as `unresolved_env:NAME`, matching spec §4.3's required
    /// `last_error` value.
    pub fn as_last_error(&self) -> String {
        format!("unresolved_env:{}", self.var_name)
    }
}

/// Resolves every `${NAME}` occurrence in `raw` using `lookup`. A literal
/// `$` not followed by `{` is passed through unchanged. Returns the first
/// unresolved variable name encountered.
fn resolve_value(raw: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Result<String, UnresolvedEnvError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.char_indices().peekable();
    let bytes = raw.as_bytes();

    while let Some((i, c)) = chars.next() {
        if c == '$' && bytes.get(i + 1) == Some(&b'{') {
            let rest = &raw[i + 2..];
            if let Some(end) = rest.find('}') {
                let var_name = &rest[..end];
                match lookup(var_name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        return Err(UnresolvedEnvError {
                            var_name: var_name.to_string(),
                        })
                    }
                }
                // Skip past the consumed `{NAME}` in the outer iterator.
                for _ in 0..(end + 2) {
                    chars.next();
                }
                continue;
            }
        }
        out.push(c);
    }
    Ok(out)
}

/// Resolves every value in `env` against the process environment,
/// returning the fully-resolved map or the first unresolved placeholder.
pub fn resolve_env(env: &HashMap<String, String>) -> Result<HashMap<String, String>, UnresolvedEnvError> {
    resolve_env_with(env, &|name| std::env::var(name).ok())
}

fn resolve_env_with(
    env: &HashMap<String, String>,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<HashMap<String, String>, UnresolvedEnvError> {
    let mut resolved = HashMap::with_capacity(env.len());
    for (key, raw_value) in env {
        let value = resolve_value(raw_value, lookup)?;
        resolved.insert(key.clone(), value);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_fixture(name: &str) -> Option<String> {
        match name {
            "API_TOKEN" => Some("secret-123".to_string()),
            "HOST" => Some("localhost".to_string()),
            _ => None,
        }
    }

    #[test]
    fn resolves_single_placeholder() {
        let mut env = HashMap::new();
        env.insert("TOKEN".to_string(), "${API_TOKEN}".to_string());
        let resolved = resolve_env_with(&env, &lookup_fixture).unwrap();
        assert_eq!(resolved.get("TOKEN").unwrap(), "secret-123");
    }

    #[test]
    fn resolves_placeholder_embedded_in_literal_text() {
        let mut env = HashMap::new();
        env.insert("URL".to_string(), "http://${HOST}:8080/api".to_string());
        let resolved = resolve_env_with(&env, &lookup_fixture).unwrap();
        assert_eq!(resolved.get("URL").unwrap(), "http://localhost:8080/api");
    }

    #[test]
    fn leaves_literal_dollar_sign_untouched() {
        let mut env = HashMap::new();
        env.insert("PRICE".to_string(), "$5 flat".to_string());
        let resolved = resolve_env_with(&env, &lookup_fixture).unwrap();
        assert_eq!(resolved.get("PRICE").unwrap(), "$5 flat");
    }

    #[test]
    fn unresolved_placeholder_reports_its_name() {
        let mut env = HashMap::new();
        env.insert("MISSING".to_string(), "${DOES_NOT_EXIST}".to_string());
        let err = resolve_env_with(&env, &lookup_fixture).unwrap_err();
        assert_eq!(err.var_name, "DOES_NOT_EXIST");
        assert_eq!(err.as_last_error(), "unresolved_env:DOES_NOT_EXIST");
    }

    #[test]
    fn empty_env_map_resolves_to_empty() {
        let env = HashMap::new();
        let resolved = resolve_env_with(&env, &lookup_fixture).unwrap();
        assert!(resolved.is_empty());
    }
}
