use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{TypeHandler, input_text, lowercase_operand, type_ids};
use crate::envelope::{ProjectionColumn, ValueEnvelope};
use crate::query::predicate::Operand;
use crate::validators::{email_parts, is_valid_email, normalize_domain};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    /// Compared case-insensitively against the address domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_domains: Option<Vec<String>>,
}

impl EmailConfig {
    pub(super) fn check_options(&self) -> Result<(), String> {
        if let Some(domains) = &self.allowed_domains
            && let Some(blank) = domains.iter().find(|domain| normalize_domain(domain).is_empty())
        {
            return Err(format!("invalid allowed domain '{blank}'"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmailHandler;

impl EmailHandler {
    fn normalized(input: &Value) -> Result<String, String> {
        let address = input_text(input)?.to_lowercase();
        if !is_valid_email(&address) {
            return Err(format!("'{address}' is not a valid email address"));
        }
        Ok(address)
    }
}

impl TypeHandler for EmailHandler {
    type Config = EmailConfig;

    fn type_id(&self) -> &'static str {
        type_ids::EMAIL
    }

    fn to_storage(&self, input: &Value, _config: &EmailConfig) -> Result<ValueEnvelope, String> {
        let address = Self::normalized(input)?;
        let mut envelope = ValueEnvelope::new(address.clone(), Some(address.clone()));
        if let Some((local, domain)) = email_parts(&address) {
            envelope = envelope.with_meta("local_part", local).with_meta("domain", domain);
        }
        Ok(envelope)
    }

    fn validate(&self, input: &Value, config: &EmailConfig) -> Result<(), String> {
        let address = Self::normalized(input)?;
        if let Some(allowed) = &config.allowed_domains {
            let domain = email_parts(&address).map(|(_, domain)| domain).unwrap_or_default();
            if !allowed.iter().any(|candidate| normalize_domain(candidate) == domain) {
                return Err(format!(
                    "Email domain '{domain}' is not allowed (expected one of: {})",
                    allowed.join(", ")
                ));
            }
        }
        Ok(())
    }

    fn sort_column(&self) -> ProjectionColumn {
        ProjectionColumn::ValueText
    }

    fn coerce_operand(&self, value: &Value, _config: &EmailConfig) -> Result<Operand, String> {
        lowercase_operand(value)
    }
}
