//! Input validation helpers
//!
//! Text length limits and the bridge from `validator` derive errors to
//! [`AppError`].

use shared::error::{AppError, AppResult, ErrorCode};
use validator::{Validate, ValidationErrors};

use crate::db::models::ShippingAddress;

// ── Text length limits ──────────────────────────────────────────────

/// Names: people, products, content titles
pub const MAX_NAME_LEN: usize = 200;

/// Descriptions, messages, content bodies
pub const MAX_TEXT_LEN: usize = 10_000;

/// Notes and reasons (rejection reason, contact reply)
pub const MAX_NOTE_LEN: usize = 2_000;

/// Short identifiers: phone, tracking number, postal code, category
pub const MAX_SHORT_TEXT_LEN: usize = 100;

/// Email addresses (RFC 5321)
pub const MAX_EMAIL_LEN: usize = 254;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Address lines
pub const MAX_ADDRESS_LEN: usize = 500;

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::with_message(
            ErrorCode::RequiredField,
            format!("{field} must not be empty"),
        ));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(value: &Option<String>, field: &str, max_len: usize) -> AppResult<()> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        )));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::with_message(
            ErrorCode::PasswordTooShort,
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password is too long (max {MAX_PASSWORD_LEN})"
        )));
    }
    Ok(())
}

/// Every address field is required
pub fn validate_address(address: &ShippingAddress) -> AppResult<()> {
    let fields = [
        (&address.street, "street"),
        (&address.city, "city"),
        (&address.island, "island"),
        (&address.postal_code, "postal_code"),
    ];
    for (value, field) in fields {
        if value.trim().is_empty() {
            return Err(AppError::with_message(
                ErrorCode::InvalidShippingAddress,
                format!("Shipping address {field} is required"),
            ));
        }
        if value.len() > MAX_ADDRESS_LEN {
            return Err(AppError::with_message(
                ErrorCode::InvalidShippingAddress,
                format!("Shipping address {field} is too long"),
            ));
        }
    }
    Ok(())
}

/// Run `validator` rules, reporting the first failing field
pub fn validate_payload<T: Validate>(payload: &T) -> AppResult<()> {
    payload.validate().map_err(first_error)
}

fn first_error(errors: ValidationErrors) -> AppError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    let Some((field, errs)) = fields.into_iter().next() else {
        return AppError::validation("Invalid request");
    };
    let message = errs
        .first()
        .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| format!("Invalid value for {field}"));
    AppError::validation(message).with_detail("field", field.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Signup {
        #[validate(email(message = "Invalid email address"))]
        email: String,
    }

    #[test]
    fn test_required_text() {
        assert!(validate_required_text("Tea", "name", 10).is_ok());
        assert_eq!(
            validate_required_text("   ", "name", 10).unwrap_err().code,
            ErrorCode::RequiredField
        );
        assert!(validate_required_text("a very long name", "name", 5).is_err());
        assert!(validate_optional_text(&Some("abcdef".into()), "note", 3).is_err());
        assert!(validate_optional_text(&None, "note", 3).is_ok());
    }

    #[test]
    fn test_password_rules() {
        assert_eq!(
            validate_password("short").unwrap_err().code,
            ErrorCode::PasswordTooShort
        );
        assert!(validate_password("long enough").is_ok());
    }

    #[test]
    fn test_address_requires_every_field() {
        let mut address = ShippingAddress {
            street: "1 Main St".into(),
            city: "Suva".into(),
            island: "Viti Levu".into(),
            postal_code: "679".into(),
        };
        assert!(validate_address(&address).is_ok());
        address.island = " ".into();
        let err = validate_address(&address).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidShippingAddress);
        assert!(err.message.contains("island"));
    }

    #[test]
    fn test_validator_messages_surface() {
        let err = validate_payload(&Signup {
            email: "not-an-email".into(),
        })
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.message, "Invalid email address");
    }
}
