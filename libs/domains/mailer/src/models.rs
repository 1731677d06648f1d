//! Mail payload models.
//!
//! Payloads are produced by request handlers and travel through Redis as
//! JSON. Only `type` is interpreted on decode. `to` and `from` are read as
//! addresses when a kind needs them, and every other field is kept so
//! templates can reference it.

use crate::error::{MailError, MailResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Known values of the payload `type` tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MailKind {
    /// A member contacting another member.
    Message,
    /// Account created.
    Registration,
    /// Password reset requested.
    Reset,
    /// Password was changed.
    PasswordChanged,
    /// Newsletter sign-up, needs confirmation.
    Subscribe,
    /// Newsletter sign-up confirmed.
    SubscriptionConfirm,
}

impl MailKind {
    /// Parse a `type` tag. Unknown tags yield `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        tag.parse().ok()
    }

    /// Read the kind from a decoded payload.
    ///
    /// Anything without a recognised string `type` yields `None`.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        payload.get("type").and_then(Value::as_str).and_then(Self::parse)
    }
}

/// A mailbox as sent by request handlers, usually a serialized user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Remaining fields such as `resetPasswordToken`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Address {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            extra: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Name when present and non-blank, otherwise the email address.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.email,
        }
    }
}

impl From<Address> for Value {
    fn from(address: Address) -> Self {
        let mut map = Map::new();
        map.insert("email".to_string(), Value::String(address.email));
        if let Some(name) = address.name {
            map.insert("name".to_string(), Value::String(name));
        }
        map.extend(address.extra);
        Value::Object(map)
    }
}

/// A queued mail payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailMessage {
    /// Raw `type` tag, kept as a string so unknown kinds survive a round trip.
    #[serde(rename = "type")]
    pub kind: String,
    /// Recipient exactly as sent; see `recipient`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Value>,
    /// Sender exactly as sent; see `sender`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Value>,
    /// Template-specific fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl MailMessage {
    pub fn new(kind: MailKind, to: Address) -> Self {
        Self {
            kind: kind.to_string(),
            to: Some(to.into()),
            from: None,
            fields: Map::new(),
        }
    }

    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Decode an already parsed payload.
    pub fn from_value(value: Value) -> MailResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> MailResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn mail_kind(&self) -> Option<MailKind> {
        MailKind::parse(&self.kind)
    }

    /// The recipient, required by every kind that sends mail.
    pub fn recipient(&self) -> MailResult<Address> {
        Self::address("to", self.to.as_ref())
    }

    /// The sender, required by `message` payloads.
    pub fn sender(&self) -> MailResult<Address> {
        Self::address("from", self.from.as_ref())
    }

    fn address(field: &'static str, value: Option<&Value>) -> MailResult<Address> {
        let value = value.ok_or(MailError::MissingField(field))?;
        serde_json::from_value(value.clone())
            .map_err(|e| MailError::InvalidPayload(format!("'{}' is not an address: {}", field, e)))
    }

    /// A top-level string field.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strum::IntoEnumIterator;

    #[test]
    fn test_kind_tags() {
        let tags: Vec<String> = MailKind::iter().map(|k| k.to_string()).collect();
        assert_eq!(
            tags,
            vec![
                "message",
                "registration",
                "reset",
                "password-changed",
                "subscribe",
                "subscription-confirm"
            ]
        );
        assert_eq!(MailKind::parse("password-changed"), Some(MailKind::PasswordChanged));
        assert_eq!(MailKind::parse("unknown-kind"), None);
        assert_eq!(MailKind::parse("Registration"), None);
    }

    #[test]
    fn test_kind_from_payload() {
        assert_eq!(
            MailKind::from_payload(&json!({"type": "reset"})),
            Some(MailKind::Reset)
        );
        assert_eq!(MailKind::from_payload(&json!({"type": 7})), None);
        assert_eq!(MailKind::from_payload(&json!({"to": {}})), None);
        assert_eq!(MailKind::from_payload(&json!([1, 2])), None);
    }

    #[test]
    fn test_unknown_fields_are_kept() {
        let payload = json!({
            "type": "reset",
            "to": {"email": "a@b.com", "name": "Ann", "resetPasswordToken": "tok"},
            "host": "nodena.org"
        });

        let message = MailMessage::from_value(payload.clone()).unwrap();
        let to = message.recipient().unwrap();
        assert_eq!(to.email, "a@b.com");
        assert_eq!(to.extra["resetPasswordToken"], "tok");
        assert_eq!(message.field_str("host"), Some("nodena.org"));
        assert!(message.from.is_none());

        let back: Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_null_name_is_accepted() {
        let message = MailMessage::from_value(json!({
            "type": "registration",
            "to": {"email": "a@b.com", "name": null}
        }))
        .unwrap();

        let to = message.recipient().unwrap();
        assert_eq!(to.name, None);
        assert_eq!(to.display_name(), "a@b.com");
    }

    #[test]
    fn test_missing_addresses() {
        let message = MailMessage::from_value(json!({"type": "message"})).unwrap();
        assert!(matches!(message.recipient(), Err(MailError::MissingField("to"))));
        assert!(matches!(message.sender(), Err(MailError::MissingField("from"))));
    }

    #[test]
    fn test_addresses_are_decoded_on_demand() {
        let message = MailMessage::from_value(json!({
            "type": "registration",
            "to": {"email": "a@b.com"},
            "from": "system"
        }))
        .unwrap();

        assert_eq!(message.recipient().unwrap().email, "a@b.com");
        assert!(matches!(message.sender(), Err(MailError::InvalidPayload(_))));

        let message = MailMessage::from_value(json!({
            "type": "subscription-confirm",
            "email": "c@b.com",
            "to": {"name": "Ann"}
        }))
        .unwrap();
        assert_eq!(message.field_str("email"), Some("c@b.com"));
        assert!(matches!(message.recipient(), Err(MailError::InvalidPayload(_))));
    }

    #[test]
    fn test_address_into_value() {
        let value: Value = Address::new("a@b.com")
            .with_name("Ann")
            .with_field("resetPasswordToken", "tok")
            .into();
        assert_eq!(
            value,
            json!({"email": "a@b.com", "name": "Ann", "resetPasswordToken": "tok"})
        );
        assert_eq!(Value::from(Address::new("a@b.com")), json!({"email": "a@b.com"}));
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        assert_eq!(Address::new("x@y.z").with_name("Xena").display_name(), "Xena");
        assert_eq!(Address::new("x@y.z").with_name("  ").display_name(), "x@y.z");
        assert_eq!(Address::new("x@y.z").display_name(), "x@y.z");
    }
}
