//! Payment method model
//!
//! Payment methods are informational: bank accounts or wallets members
//! can use to pay course fees offline.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentMethod {
    pub id: i64,
    pub name: String,
    /// Account number or payment instructions
    pub details: String,
    pub logo: Option<String>,
    /// Inactive methods are hidden from the public listing
    pub is_active: bool,
    pub position: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentMethodInput {
    pub name: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub position: i32,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePaymentMethodInput {
    pub name: Option<String>,
    pub details: Option<String>,
    pub logo: Option<String>,
    pub is_active: Option<bool>,
    pub position: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_input_defaults_to_active() {
        let input: CreatePaymentMethodInput = serde_json::from_str(r#"{"name":"Bank"}"#).unwrap();
        assert!(input.is_active);
        assert_eq!(input.position, 0);
        assert_eq!(input.details, "");
    }
}
