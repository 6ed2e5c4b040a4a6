use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::{TypeHandler, input_text, lowercase_operand, type_ids};
use crate::envelope::{ProjectionColumn, ValueEnvelope};
use crate::query::predicate::Operand;

fn default_schemes() -> Vec<String> {
    vec!["http".to_string(), "https".to_string()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UrlConfig {
    #[serde(default = "default_schemes")]
    pub allowed_schemes: Vec<String>,
    #[serde(default)]
    pub require_domain: bool,
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self {
            allowed_schemes: default_schemes(),
            require_domain: false,
        }
    }
}

impl UrlConfig {
    pub(super) fn check_options(&self) -> Result<(), String> {
        if self.allowed_schemes.is_empty() {
            return Err("allowed_schemes must list at least one scheme".to_string());
        }
        if let Some(blank) = self.allowed_schemes.iter().find(|scheme| scheme.trim().is_empty()) {
            return Err(format!("invalid scheme '{blank}'"));
        }
        Ok(())
    }

    fn allows(&self, scheme: &str) -> bool {
        self.allowed_schemes.iter().any(|allowed| allowed.eq_ignore_ascii_case(scheme))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UrlHandler;

impl UrlHandler {
    fn parse(input: &Value) -> Result<Url, String> {
        let text = input_text(input)?;
        Url::parse(&text).map_err(|err| format!("'{text}' is not a valid URL: {err}"))
    }
}

impl TypeHandler for UrlHandler {
    type Config = UrlConfig;

    fn type_id(&self) -> &'static str {
        type_ids::URL
    }

    fn to_storage(&self, input: &Value, _config: &UrlConfig) -> Result<ValueEnvelope, String> {
        // Keep the caller's spelling; `Url` would append a trailing slash to bare hosts.
        let text = input_text(input)?;
        let url = Self::parse(input)?;
        let mut envelope = ValueEnvelope::new(text.clone(), Some(text.to_lowercase())).with_meta("scheme", url.scheme());
        if let Some(host) = url.host_str() {
            envelope = envelope.with_meta("host", host);
        }
        Ok(envelope)
    }

    fn validate(&self, input: &Value, config: &UrlConfig) -> Result<(), String> {
        let url = Self::parse(input)?;
        if !config.allows(url.scheme()) {
            return Err(format!(
                "URL scheme '{}' is not allowed (expected one of: {})",
                url.scheme(),
                config.allowed_schemes.join(", ")
            ));
        }
        if config.require_domain && url.domain().is_none() {
            return Err("URL must contain a domain name".to_string());
        }
        Ok(())
    }

    fn sort_column(&self) -> ProjectionColumn {
        ProjectionColumn::ValueText
    }

    fn coerce_operand(&self, value: &Value, _config: &UrlConfig) -> Result<Operand, String> {
        lowercase_operand(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_schemes_are_http_and_https() {
        let config = UrlConfig::default();
        assert!(UrlHandler.validate(&json!("https://example.com/a"), &config).is_ok());
        assert!(UrlHandler.validate(&json!("ftp://example.com/a"), &config).is_err());
    }

    #[test]
    fn configured_schemes_are_case_insensitive() {
        let config: UrlConfig = super::super::parse_config(&json!({"allowed_schemes": ["FTP"]})).unwrap();
        assert!(UrlHandler.validate(&json!("ftp://files.example.com"), &config).is_ok());
    }

    #[test]
    fn require_domain_rejects_ip_hosts() {
        let config: UrlConfig = super::super::parse_config(&json!({"require_domain": true})).unwrap();
        assert!(UrlHandler.validate(&json!("http://192.168.0.1/status"), &config).is_err());
        assert!(UrlHandler.validate(&json!("http://intranet.example.org"), &config).is_ok());
    }

    #[test]
    fn sortable_is_lowercased_and_raw_untouched() {
        let envelope = UrlHandler
            .to_storage(&json!(" https://Example.com/Docs "), &UrlConfig::default())
            .unwrap();
        assert_eq!(envelope.raw, json!("https://Example.com/Docs"));
        assert_eq!(envelope.sortable.as_deref(), Some("https://example.com/docs"));
        assert_eq!(envelope.metadata.get("host"), Some(&json!("example.com")));
    }

    #[test]
    fn relative_urls_are_invalid() {
        assert!(UrlHandler.validate(&json!("/docs/index.html"), &UrlConfig::default()).is_err());
    }

    #[test]
    fn empty_scheme_list_is_invalid_config() {
        assert!(super::super::parse_config::<UrlConfig>(&json!({"allowed_schemes": []})).is_err());
    }
}
