//! Field-presence and email-shape checks run before a request reaches the
//! credential store or the campaign queries.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::auth::dto::{ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest};
use crate::campaigns::dto::{CreateCampaignRequest, UpdateCampaignRequest};
use crate::users::dto::UpdateUserRequest;

const EMPTY: &str = "Must not be empty!";
const BAD_EMAIL: &str = "Must be a valid email address!";
const AT_IN_HANDLE: &str = "Must not contain '@'!";

/// Field name to user-facing message, serialized as a flat JSON object.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn require(&mut self, field: &'static str, value: &str) {
        if is_blank(value) {
            self.add(field, EMPTY);
        }
    }

    fn require_email(&mut self, field: &'static str, value: &str) {
        if is_blank(value) {
            self.add(field, EMPTY);
        } else if !is_email(value.trim()) {
            self.add(field, BAD_EMAIL);
        }
    }

    /// Handles share the login field with emails, so they may not look like one.
    fn require_handle(&mut self, field: &'static str, value: &str) {
        if is_blank(value) {
            self.add(field, EMPTY);
        } else if value.contains('@') {
            self.add(field, AT_IN_HANDLE);
        }
    }

    /// Optional fields may be omitted, but not sent blank.
    fn non_blank_if_present(&mut self, field: &'static str, value: Option<&str>) {
        if let Some(v) = value {
            self.require(field, v);
        }
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn is_email(value: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(
            r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))$"#
        )
        .unwrap();
    }
    EMAIL_RE.is_match(value)
}

pub fn validate_registration(req: &RegisterRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.require("firstName", &req.first_name);
    errors.require("lastName", &req.last_name);
    errors.require_handle("handle", &req.handle);
    errors.require_email("email", &req.email);
    errors.require("password", &req.password);
    errors.into_result()
}

pub fn validate_login(req: &LoginRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.require("login", &req.login);
    errors.require("password", &req.password);
    errors.into_result()
}

pub fn validate_forgot(req: &ForgotPasswordRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.require_email("email", &req.email);
    errors.into_result()
}

pub fn validate_reset(req: &ResetPasswordRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.require("token", &req.token);
    errors.require("password", &req.password);
    errors.into_result()
}

pub fn validate_user_update(req: &UpdateUserRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.non_blank_if_present("firstName", req.first_name.as_deref());
    errors.non_blank_if_present("lastName", req.last_name.as_deref());
    if let Some(handle) = req.handle.as_deref() {
        errors.require_handle("handle", handle);
    }
    errors.non_blank_if_present("password", req.password.as_deref());
    if let Some(email) = req.email.as_deref() {
        errors.require_email("email", email);
    }
    errors.into_result()
}

pub fn validate_campaign(req: &CreateCampaignRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.require("name", &req.name);
    errors.into_result()
}

pub fn validate_campaign_update(req: &UpdateCampaignRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.non_blank_if_present("name", req.name.as_deref());
    if let Some(monsters) = &req.monsters {
        if monsters.iter().any(|m| is_blank(&m.slug)) {
            errors.add("monsters", "Every monster needs a slug!");
        } else if monsters.iter().any(|m| is_blank(&m.name)) {
            errors.add("monsters", "Every monster needs a name!");
        }
    }
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> RegisterRequest {
        RegisterRequest {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            handle: "ax".into(),
            email: "a@x.com".into(),
            password: "pw1".into(),
        }
    }

    #[test]
    fn email_shapes() {
        assert!(is_email("a@x.com"));
        assert!(is_email("first.last@sub.example.org"));
        assert!(is_email("user@[127.0.0.1]"));
        assert!(!is_email("a@x"));
        assert!(!is_email("no-at-sign.com"));
        assert!(!is_email("two@@x.com"));
        assert!(!is_email("spaces in@x.com"));
    }

    #[test]
    fn complete_registration_passes() {
        assert!(validate_registration(&registration()).is_ok());
    }

    #[test]
    fn blank_registration_reports_every_field() {
        let errors = validate_registration(&RegisterRequest::default()).unwrap_err();
        for field in ["firstName", "lastName", "handle", "email", "password"] {
            assert_eq!(errors.get(field), Some(EMPTY), "field {field}");
        }
    }

    #[test]
    fn whitespace_only_counts_as_empty() {
        let req = RegisterRequest {
            handle: "   ".into(),
            ..registration()
        };
        let errors = validate_registration(&req).unwrap_err();
        assert_eq!(errors.get("handle"), Some(EMPTY));
        assert_eq!(errors.get("email"), None);
    }

    #[test]
    fn malformed_email_is_reported_separately_from_empty() {
        let req = RegisterRequest {
            email: "not-an-email".into(),
            ..registration()
        };
        let errors = validate_registration(&req).unwrap_err();
        assert_eq!(errors.get("email"), Some(BAD_EMAIL));
    }

    #[test]
    fn handles_may_not_look_like_emails() {
        let req = RegisterRequest {
            handle: "alice@x.com".into(),
            ..registration()
        };
        let errors = validate_registration(&req).unwrap_err();
        assert_eq!(errors.get("handle"), Some(AT_IN_HANDLE));

        let update = UpdateUserRequest {
            handle: Some("alice@x.com".into()),
            ..Default::default()
        };
        let errors = validate_user_update(&update).unwrap_err();
        assert_eq!(errors.get("handle"), Some(AT_IN_HANDLE));
    }

    #[test]
    fn campaign_update_needs_named_monsters() {
        let monster = serde_json::from_value(serde_json::json!({ "slug": "goblin", "name": " " }))
            .unwrap();
        let req = UpdateCampaignRequest {
            name: None,
            monsters: Some(vec![monster]),
        };
        let errors = validate_campaign_update(&req).unwrap_err();
        assert_eq!(errors.get("monsters"), Some("Every monster needs a name!"));
    }

    #[test]
    fn reset_requires_token_and_password() {
        let errors = validate_reset(&ResetPasswordRequest::default()).unwrap_err();
        assert_eq!(errors.get("token"), Some(EMPTY));
        assert_eq!(errors.get("password"), Some(EMPTY));
    }

    #[test]
    fn user_update_allows_omitted_but_not_blank_fields() {
        assert!(validate_user_update(&UpdateUserRequest::default()).is_ok());

        let req = UpdateUserRequest {
            password: Some("".into()),
            email: Some("bad".into()),
            ..Default::default()
        };
        let errors = validate_user_update(&req).unwrap_err();
        assert_eq!(errors.get("password"), Some(EMPTY));
        assert_eq!(errors.get("email"), Some(BAD_EMAIL));
    }

    #[test]
    fn field_errors_serialize_flat() {
        let errors = FieldErrors::single("email", "Email already in use.");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({ "email": "Email already in use." }));
    }
}
