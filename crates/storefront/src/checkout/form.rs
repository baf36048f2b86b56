//! Shipping form and its local validation.

use std::sync::LazyLock;

use marigold_core::Price;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::api::{FieldErrors, OrderItemRequest, OrderRequest};

/// Domestic mobile numbers: `0` or `+84`, a carrier prefix, then seven digits.
static VN_MOBILE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(0|\+84)(3[2-9]|5[689]|7[06-9]|8[1-9]|9[0-9])[0-9]{7}$").ok()
});

/// Delivery speed, each with a fixed fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShippingMethod {
    #[default]
    Free,
    Normal,
    Fast,
}

impl ShippingMethod {
    pub const ALL: [Self; 3] = [Self::Free, Self::Normal, Self::Fast];

    #[must_use]
    pub fn fee(self) -> Price {
        match self {
            Self::Free => Price::ZERO,
            Self::Normal => Price::from_units(50_000),
            Self::Fast => Price::from_units(100_000),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Normal => "normal",
            Self::Fast => "fast",
        }
    }
}

impl std::fmt::Display for ShippingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ShippingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown shipping method '{s}' (expected free, normal or fast)"))
    }
}

/// A shipping form input, named as the remote service names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShippingField {
    FirstName,
    LastName,
    Country,
    Street,
    City,
    State,
    Zip,
    Phone,
}

impl ShippingField {
    pub const ALL: [Self; 8] = [
        Self::FirstName,
        Self::LastName,
        Self::Country,
        Self::Street,
        Self::City,
        Self::State,
        Self::Zip,
        Self::Phone,
    ];

    /// Wire name, also the key of field-scoped errors.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::Country => "country",
            Self::Street => "street",
            Self::City => "city",
            Self::State => "state",
            Self::Zip => "zip",
            Self::Phone => "phone",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FirstName => "First name",
            Self::LastName => "Last name",
            Self::Country => "Country",
            Self::Street => "Street name",
            Self::City => "City",
            Self::State => "State / Province",
            Self::Zip => "Zip-code",
            Self::Phone => "Phone number",
        }
    }

    #[must_use]
    pub const fn is_required(self) -> bool {
        !matches!(self, Self::State)
    }

    /// Field named `wire`, if any.
    #[must_use]
    pub fn from_wire(wire: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.wire_name() == wire)
    }
}

/// Shipping contact details entered on the first checkout stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingForm {
    pub first_name: String,
    pub last_name: String,
    pub country: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub phone: String,
}

impl ShippingForm {
    #[must_use]
    pub fn value(&self, field: ShippingField) -> &str {
        match field {
            ShippingField::FirstName => &self.first_name,
            ShippingField::LastName => &self.last_name,
            ShippingField::Country => &self.country,
            ShippingField::Street => &self.street,
            ShippingField::City => &self.city,
            ShippingField::State => &self.state,
            ShippingField::Zip => &self.zip,
            ShippingField::Phone => &self.phone,
        }
    }

    pub fn set(&mut self, field: ShippingField, value: impl Into<String>) {
        let slot = match field {
            ShippingField::FirstName => &mut self.first_name,
            ShippingField::LastName => &mut self.last_name,
            ShippingField::Country => &mut self.country,
            ShippingField::Street => &mut self.street,
            ShippingField::City => &mut self.city,
            ShippingField::State => &mut self.state,
            ShippingField::Zip => &mut self.zip,
            ShippingField::Phone => &mut self.phone,
        };
        *slot = value.into();
    }

    /// Local validation. An empty result means the form may be submitted.
    #[must_use]
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();

        for field in ShippingField::ALL {
            if field == ShippingField::Phone || !field.is_required() {
                continue;
            }
            if self.value(field).trim().is_empty() {
                errors.insert(field.wire_name(), format!("{} is required", field.label()));
            }
        }

        if let Some(message) = phone_error(&self.phone) {
            errors.insert(ShippingField::Phone.wire_name(), message);
        }

        errors
    }

    /// Build the order-creation request. Values are trimmed; an empty state is omitted.
    #[must_use]
    pub fn to_request(&self, method: ShippingMethod, items: Vec<OrderItemRequest>) -> OrderRequest {
        let state = self.state.trim();
        OrderRequest {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            street: self.street.trim().to_string(),
            city: self.city.trim().to_string(),
            state: (!state.is_empty()).then(|| state.to_string()),
            country: self.country.trim().to_string(),
            zip: self.zip.trim().to_string(),
            phone: self.phone.trim().to_string(),
            shipping_method: method,
            shipping_price: method.fee(),
            order_items: items,
        }
    }
}

/// Whether `phone` is a valid domestic mobile number (surrounding whitespace ignored).
#[must_use]
pub fn is_valid_phone(phone: &str) -> bool {
    phone_error(phone).is_none()
}

fn phone_error(phone: &str) -> Option<String> {
    let trimmed = phone.trim();
    if trimmed.is_empty() {
        return Some("Phone number is required".to_string());
    }
    let valid = VN_MOBILE.as_ref().is_some_and(|re| re.is_match(trimmed));
    (!valid).then(|| "Invalid Vietnam phone number".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn filled() -> ShippingForm {
        ShippingForm {
            first_name: "Lan".to_string(),
            last_name: "Nguyen".to_string(),
            country: "Vietnam".to_string(),
            street: "12 Ly Thuong Kiet".to_string(),
            city: "Hanoi".to_string(),
            state: String::new(),
            zip: "100000".to_string(),
            phone: "0912345678".to_string(),
        }
    }

    #[test]
    fn test_valid_form() {
        assert!(filled().validate().is_empty());
    }

    #[test]
    fn test_required_fields() {
        let errors = ShippingForm::default().validate();
        let fields: Vec<&str> = errors.iter().map(|(f, _)| f).collect();
        assert_eq!(
            fields,
            vec!["city", "country", "firstName", "lastName", "phone", "street", "zip"]
        );
        assert_eq!(errors.get("zip"), Some("Zip-code is required"));
        assert_eq!(errors.get("phone"), Some("Phone number is required"));
        assert!(errors.get("state").is_none());
    }

    #[test]
    fn test_whitespace_only_counts_as_empty() {
        let mut form = filled();
        form.set(ShippingField::City, "   ");
        assert_eq!(form.validate().get("city"), Some("City is required"));
    }

    #[test]
    fn test_phone_prefixes() {
        assert!(is_valid_phone("0912345678"));
        assert!(is_valid_phone("+84912345678"));
        assert!(is_valid_phone(" 0352345678 "));
        assert!(is_valid_phone("0702345678"));
        assert!(is_valid_phone("0862345678"));

        assert!(!is_valid_phone("0123456789"));
        assert!(!is_valid_phone("0312345678"));
        assert!(!is_valid_phone("0712345678"));
        assert!(!is_valid_phone("091234567"));
        assert!(!is_valid_phone("09123456789"));
        assert!(!is_valid_phone("84912345678"));
    }

    #[test]
    fn test_invalid_phone_message() {
        let mut form = filled();
        form.phone = "0123456789".to_string();
        let errors = form.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("phone"), Some("Invalid Vietnam phone number"));
    }

    #[test]
    fn test_request_carries_fee_and_trims() {
        let mut form = filled();
        form.first_name = "  Lan ".to_string();
        let request = form.to_request(ShippingMethod::Fast, vec![]);
        assert_eq!(request.first_name, "Lan");
        assert_eq!(request.state, None);
        assert_eq!(request.shipping_price, Price::from_units(100_000));

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["shippingMethod"], "fast");
        assert!(json.get("state").is_none());
    }

    #[test]
    fn test_shipping_method_parsing() {
        assert_eq!("Normal".parse::<ShippingMethod>().unwrap(), ShippingMethod::Normal);
        assert!("overnight".parse::<ShippingMethod>().is_err());
        assert_eq!(ShippingMethod::Normal.fee(), Price::from_units(50_000));
        assert_eq!(ShippingMethod::default(), ShippingMethod::Free);
    }

    #[test]
    fn test_wire_names_round_trip() {
        for field in ShippingField::ALL {
            assert_eq!(ShippingField::from_wire(field.wire_name()), Some(field));
        }
    }
}
