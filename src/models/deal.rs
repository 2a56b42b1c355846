//! Read-only view of a CRM deal.

use serde_json::Value;

/// Customer label used when the CRM has no person attached or is unreachable.
pub const DEFAULT_CUSTOMER: &str = "Customer";

/// Deal fields the bot reads from Pipedrive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DealRecord {
    /// Pipedrive deal ID.
    pub id: String,
    /// Name of the linked person (the customer).
    pub person_name: Option<String>,
    /// Estimator's name from the configured custom field.
    pub estimator: Option<String>,
}

impl DealRecord {
    /// Build a record from the `data` object of a Pipedrive deal response.
    #[must_use]
    pub fn from_api(data: &Value, estimator_field: Option<&str>) -> Self {
        let id = match data.get("id") {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };
        Self {
            id,
            person_name: non_empty_str(data.get("person_name")),
            estimator: estimator_field.and_then(|field| field_text(data.get(field))),
        }
    }

    /// Person name, or [`DEFAULT_CUSTOMER`].
    #[must_use]
    pub fn customer_label(&self) -> &str {
        self.person_name.as_deref().unwrap_or(DEFAULT_CUSTOMER)
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Render a custom-field value as text.
///
/// Text fields arrive as strings, user/person fields as objects with a
/// `name` member, and enum fields as option IDs.
#[must_use]
pub fn field_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_owned()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => non_empty_str(map.get("name")),
        _ => None,
    }
}
