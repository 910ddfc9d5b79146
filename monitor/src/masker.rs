//! Redaction of sensitive values before a payload leaves the process.
//!
//! Keys are matched case-insensitively, either exactly against the key list
//! or against any of the configured patterns. Masking never fails: input that
//! cannot be parsed is returned as it came in.

use std::collections::{BTreeMap, HashSet};

use common::env_config::MaskingConfig;
use common::error::Res;
use model::HeaderMap;
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use url::{Url, form_urlencoded};

/// Credential, secret and identity field names, English and Portuguese.
pub const DEFAULT_SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "senha",
    "token",
    "access_token",
    "accesstoken",
    "refresh_token",
    "refreshtoken",
    "id_token",
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "secret",
    "client_secret",
    "segredo",
    "api_key",
    "apikey",
    "api-key",
    "x-api-key",
    "chave",
    "chave_api",
    "signature",
    "assinatura",
    "pin",
    "otp",
    "cvv",
    "card_number",
    "cardnumber",
    "numero_cartao",
    "cartao",
    "ssn",
    "cpf",
    "cnpj",
    "rg",
];

#[derive(Debug, Clone)]
pub struct Masker {
    keys: HashSet<String>,
    patterns: Vec<Regex>,
    marker: String,
}

impl Masker {
    pub fn new(config: &MaskingConfig) -> Res<Self> {
        let mut keys: HashSet<String> = if config.replace_default_keys {
            HashSet::new()
        } else {
            DEFAULT_SENSITIVE_KEYS.iter().map(|k| k.to_string()).collect()
        };
        keys.extend(config.keys.iter().map(|k| k.trim().to_lowercase()));

        let patterns = config
            .patterns
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Masker {
            keys,
            patterns,
            marker: config.marker.clone(),
        })
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        let key = key.trim();
        self.keys.contains(&key.to_lowercase()) || self.patterns.iter().any(|p| p.is_match(key))
    }

    /// Rewrites every object in the tree, replacing sensitive values.
    pub fn mask_value(&self, value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let masked: Map<String, Value> = map
                    .into_iter()
                    .map(|(key, inner)| {
                        if self.is_sensitive(&key) {
                            (key, Value::String(self.marker.clone()))
                        } else {
                            (key, self.mask_value(inner))
                        }
                    })
                    .collect();
                Value::Object(masked)
            }
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.mask_value(v)).collect())
            }
            scalar => scalar,
        }
    }

    /// Masks a JSON document held as text. Text that is not JSON comes back
    /// unchanged.
    pub fn mask_json(&self, raw: &str) -> String {
        match serde_json::from_str::<Value>(raw) {
            Ok(tree) => serde_json::to_string(&self.mask_value(tree))
                .unwrap_or_else(|_| raw.to_string()),
            Err(e) => {
                log::debug!("Body left unmasked, not JSON: {}", e);
                raw.to_string()
            }
        }
    }

    /// Masks values of sensitive keys in a form-encoded query string.
    ///
    /// Keys are percent-decoded before matching. A query without sensitive
    /// keys comes back byte for byte.
    pub fn mask_query(&self, raw: &str) -> String {
        let pairs: Vec<_> = form_urlencoded::parse(raw.as_bytes()).collect();
        if !pairs.iter().any(|(key, _)| self.is_sensitive(key)) {
            return raw.to_string();
        }

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &pairs {
            if self.is_sensitive(key) {
                serializer.append_pair(key, &self.marker);
            } else {
                serializer.append_pair(key, value);
            }
        }
        serializer.finish()
    }

    /// Masks the query part of an absolute URL. Text that does not parse as
    /// a URL comes back unchanged.
    pub fn mask_url(&self, raw: &str) -> String {
        let mut url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                log::debug!("Url left unmasked, not absolute: {}", e);
                return raw.to_string();
            }
        };
        let Some(query) = url.query() else {
            return raw.to_string();
        };

        let masked = self.mask_query(query);
        if masked == query {
            return raw.to_string();
        }
        url.set_query(Some(&masked));
        url.to_string()
    }

    pub fn mask_headers(&self, headers: &HeaderMap) -> HeaderMap {
        headers
            .iter()
            .map(|(name, values)| {
                if self.is_sensitive(name) {
                    (name.clone(), vec![self.marker.clone(); values.len().max(1)])
                } else {
                    (name.clone(), values.clone())
                }
            })
            .collect()
    }

    pub fn mask_claims(&self, claims: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        claims
            .iter()
            .map(|(key, value)| {
                if self.is_sensitive(key) {
                    (key.clone(), self.marker.clone())
                } else {
                    (key.clone(), value.clone())
                }
            })
            .collect()
    }
}
