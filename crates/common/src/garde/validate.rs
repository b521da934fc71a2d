//! Garde validation utilities.

use crate::domain::DomainError;
use garde::{Report, Validate};

const DEVICE_NAME_MAX_LEN: usize = 63;

/// Validate a request, converting the garde report to a `DomainError`
pub fn validate<T>(value: &T) -> Result<(), DomainError>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| DomainError::ValidationError(format_validation_errors(&report)))
}

/// Garde custom rule for device names: 1 to 63 ASCII alphanumerics and
/// hyphens, without a leading or trailing hyphen
pub fn device_name(value: &str, _context: &()) -> garde::Result {
    if value.is_empty() || value.len() > DEVICE_NAME_MAX_LEN {
        return Err(garde::Error::new(format!(
            "length must be between 1 and {DEVICE_NAME_MAX_LEN}"
        )));
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(garde::Error::new(
            "only ASCII letters, digits and hyphens are allowed",
        ));
    }

    if value.starts_with('-') || value.ends_with('-') {
        return Err(garde::Error::new("must not start or end with a hyphen"));
    }

    Ok(())
}

/// Format validation errors from garde Report into a human-readable string
fn format_validation_errors(report: &Report) -> String {
    report
        .iter()
        .map(|(path, error)| {
            if path.to_string().is_empty() {
                error.message().to_string()
            } else {
                format!("{}: {}", path, error.message())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use garde::Validate;

    #[derive(Validate)]
    struct RenameRequest {
        #[garde(length(min = 1))]
        tenant_id: String,
        #[garde(custom(device_name))]
        name: String,
    }

    fn request(name: &str) -> RenameRequest {
        RenameRequest {
            tenant_id: "tenant".to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_validate_success() {
        assert!(validate(&request("edge-gw-01")).is_ok());
        assert!(validate(&request("a")).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_device_names() {
        for name in ["", "-leading", "trailing-", "---invalid...", "under_score", "sp ace"] {
            let result = validate(&request(name));
            assert!(
                matches!(result, Err(DomainError::ValidationError(_))),
                "expected {name:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_validate_rejects_overlong_device_name() {
        let name = "a".repeat(64);
        assert!(validate(&request(&name)).is_err());
        assert!(validate(&request(&"a".repeat(63))).is_ok());
    }

    #[test]
    fn test_validate_error_message_contains_field_info() {
        let result = validate(&RenameRequest {
            tenant_id: "".to_string(),
            name: "ok".to_string(),
        });
        if let Err(DomainError::ValidationError(msg)) = result {
            assert!(msg.contains("tenant_id"));
        } else {
            panic!("Expected ValidationError");
        }
    }
}
