use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

const EMAIL_MESSAGE: &str = "Valid email is required.";

/// Raw inquiry payload as submitted by the public form or an admin edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct InquiryFields {
    #[serde(default)]
    #[validate(length(min = 2, message = "Name is required."))]
    pub name: String,
    #[serde(default)]
    #[validate(
        email(message = "Valid email is required."),
        custom(function = "dotted_email_domain")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Location is required."))]
    pub location: String,
    #[serde(default)]
    #[validate(length(min = 5, message = "Message is required."))]
    pub message: String,
}

/// Rejects addresses whose domain has no dot-separated top-level label, such
/// as `a@b` or `jane@localhost`, which the plain syntax check still accepts.
fn dotted_email_domain(email: &str) -> Result<(), ValidationError> {
    let invalid =
        || ValidationError::new("email_domain").with_message(Cow::Borrowed(EMAIL_MESSAGE));

    let Some((_, domain)) = email.rsplit_once('@') else {
        return Err(invalid());
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return Err(invalid());
    };
    let tld_ok = tld.chars().count() >= 2 && tld.chars().all(char::is_alphabetic);
    let host_ok = !host.is_empty() && host.split('.').all(|label| !label.is_empty());

    if tld_ok && host_ok { Ok(()) } else { Err(invalid()) }
}

/// One user-correctable problem with a submitted field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

const FIELD_ORDER: [&str; 4] = ["name", "email", "location", "message"];

impl InquiryFields {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            location: location.into(),
            message: message.into(),
        }
    }

    fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            location: self.location.trim().to_string(),
            message: self.message.trim().to_string(),
        }
    }

    /// Trims every field and checks it, yielding either fields that are safe
    /// to persist or one violation per failing field.
    pub fn validated(self) -> Result<ValidInquiry, Vec<FieldViolation>> {
        let fields = self.trimmed();

        match fields.validate() {
            Ok(()) => Ok(ValidInquiry(fields)),
            Err(errors) => {
                let by_field = errors.field_errors();
                let violations = FIELD_ORDER
                    .iter()
                    .filter_map(|&field| {
                        let first = by_field.get(field)?.first()?;
                        let message = first
                            .message
                            .as_ref()
                            .map(|message| message.to_string())
                            .unwrap_or_else(|| format!("{field} is invalid."));
                        Some(FieldViolation { field, message })
                    })
                    .collect();
                Err(violations)
            }
        }
    }
}

/// Inquiry fields that passed validation. Only constructible through
/// [`InquiryFields::validated`], so stores never see unchecked input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidInquiry(InquiryFields);

impl ValidInquiry {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn email(&self) -> &str {
        &self.0.email
    }

    pub fn location(&self) -> &str {
        &self.0.location
    }

    pub fn message(&self) -> &str {
        &self.0.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_payload() {
        let valid = InquiryFields::new(
            "  Jane Doe ",
            "jane@example.com",
            "Lagos",
            "Need a quote for a 3-bedroom build.",
        )
        .validated()
        .expect("valid payload");

        assert_eq!(valid.name(), "Jane Doe");
        assert_eq!(valid.email(), "jane@example.com");
    }

    #[test]
    fn reports_every_invalid_field_in_form_order() {
        let violations = InquiryFields::new("J", "not-an-email", "   ", "hey")
            .validated()
            .expect_err("invalid payload");

        let fields: Vec<_> = violations.iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["name", "email", "location", "message"]);
        assert_eq!(violations[1].message, EMAIL_MESSAGE);
    }

    #[test]
    fn email_domain_needs_a_top_level_label() {
        for email in ["a@b", "jane@example", "jane@localhost", "jane@example.", "jane@.com"] {
            let violations = InquiryFields::new("Jane", email, "Lagos", "hello there")
                .validated()
                .expect_err(email);
            assert_eq!(violations.len(), 1, "{email}");
            assert_eq!(violations[0].field, "email");
            assert_eq!(violations[0].message, EMAIL_MESSAGE);
        }

        for email in ["jane@example.com", "j.doe@mail.example.co.uk", "ada+leads@example.ng"] {
            assert!(
                InquiryFields::new("Jane", email, "Lagos", "hello there")
                    .validated()
                    .is_ok(),
                "{email}"
            );
        }
    }

    #[test]
    fn whitespace_does_not_count_towards_length() {
        let violations = InquiryFields::new("A ", "a@b.co", "Abuja", "  hi   ")
            .validated()
            .expect_err("too short after trimming");

        let fields: Vec<_> = violations.iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["name", "message"]);
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert!(InquiryFields::new("Ñ", "a@b.co", "Kano", "hello")
            .validated()
            .is_err());
        assert!(InquiryFields::new("Ñö", "a@b.co", "Kano", "héllo")
            .validated()
            .is_ok());
    }
}
