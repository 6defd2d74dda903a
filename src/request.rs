//! Audit request model and validation

use crate::error::{AuditError, Result};
use serde::Deserialize;

/// A validated request to run one SEO audit.
///
/// The wire field names (`website`, `name`, `email`) match the public
/// `POST /run-audit` contract.
/// Absent fields deserialize as empty strings so that `validate` (not the
/// JSON layer) reports them, keeping the 400 response shape uniform.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuditRequest {
    pub website: String,
    #[serde(rename = "name")]
    pub requester_name: String,
    #[serde(rename = "email")]
    pub requester_email: String,
}

impl AuditRequest {
    pub fn new(website: &str, requester_name: &str, requester_email: &str) -> Self {
        Self {
            website: website.to_string(),
            requester_name: requester_name.to_string(),
            requester_email: requester_email.to_string(),
        }
    }

    /// Check that all three fields are present and non-empty.
    ///
    /// No further format validation is applied; the external form is the
    /// authority on what it accepts.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.website.trim().is_empty() {
            missing.push("website");
        }
        if self.requester_name.trim().is_empty() {
            missing.push("name");
        }
        if self.requester_email.trim().is_empty() {
            missing.push("email");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuditError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;

    #[test]
    fn test_well_formed_request_passes() {
        let req = AuditRequest::new("example.com", "Jane", "jane@example.com");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_are_named() {
        let req = AuditRequest::new("example.com", "", "  ");
        let err = req.validate().unwrap_err();
        assert_eq!(err.stage(), Stage::Validation);
        let msg = err.to_string();
        assert!(msg.contains("name"));
        assert!(msg.contains("email"));
        assert!(!msg.contains("website"));
    }

    #[test]
    fn test_absent_fields_deserialize_empty() {
        let req: AuditRequest = serde_json::from_str(r#"{"website":"example.com"}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_deserializes_wire_names() {
        let req: AuditRequest = serde_json::from_str(
            r#"{"website":"example.com","name":"Jane","email":"jane@example.com"}"#,
        )
        .unwrap();
        assert_eq!(req.requester_name, "Jane");
        assert_eq!(req.requester_email, "jane@example.com");
    }
}
