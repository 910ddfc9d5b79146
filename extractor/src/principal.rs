use std::collections::HashMap;

use common::error::Res;
use jsonwebtoken::{DecodingKey, Validation, decode};
use model::Principal;
use serde_json::Value;

const ROLE_CLAIMS: [&str; 2] = ["role", "roles"];

/// Validates a bearer token and flattens its claims into a [`Principal`].
///
/// Roles come from the `role`/`roles` claims, either a string or an array of
/// strings. Every claim is kept, non-string values as their JSON text.
pub fn principal_from_token(token: &str, secret: &str) -> Res<Principal> {
    let mut validation = Validation::default();
    validation.required_spec_claims.clear();

    let data = decode::<HashMap<String, Value>>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;

    let mut principal = Principal::default();
    for (key, value) in data.claims {
        if ROLE_CLAIMS.contains(&key.as_str()) {
            match &value {
                Value::String(role) => {
                    principal.roles.insert(role.clone());
                }
                Value::Array(roles) => principal
                    .roles
                    .extend(roles.iter().filter_map(|r| r.as_str().map(str::to_string))),
                _ => {}
            }
        }
        let flat = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        principal.claims.insert(key, flat);
    }
    Ok(principal)
}

/// Token part of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    pub(crate) fn token(claims: Value, secret: &str) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn flattens_claims_and_roles() {
        let t = token(
            json!({"sub": "42", "roles": ["admin", "ops"], "role": "auditor", "tenant": 7}),
            "s3cret",
        );
        let p = principal_from_token(&t, "s3cret").unwrap();
        assert_eq!(
            p.roles.iter().cloned().collect::<Vec<_>>(),
            vec!["admin", "auditor", "ops"]
        );
        assert_eq!(p.claims["sub"], "42");
        assert_eq!(p.claims["tenant"], "7");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let t = token(json!({"sub": "42"}), "right");
        assert!(principal_from_token(&t, "wrong").is_err());
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
