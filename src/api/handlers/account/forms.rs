//! Form payloads and their validation.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::identity::{validators::valid_email, User};

pub const EMAIL_REQUIRED: &str = "The Email field is required.";
pub const EMAIL_INVALID: &str = "The Email field is not a valid e-mail address.";
pub const PASSWORD_REQUIRED: &str = "The Password field is required.";
pub const PASSWORD_MISMATCH: &str = "The password and confirmation password do not match.";
pub const INVALID_LOGIN: &str = "Invalid UserName or Password";

/// Validation messages collected while handling one submission.
///
/// Field messages render next to their input; form-level messages render in
/// the summary above the form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: Vec<(&'static str, String)>,
    form: Vec<String>,
}

impl FormErrors {
    pub fn add_field(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.push((field, message.into()));
    }

    pub fn add_form(&mut self, message: impl Into<String>) {
        self.form.push(message.into());
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.fields.is_empty() && self.form.is_empty()
    }

    /// First message recorded for `field`.
    #[must_use]
    pub fn field(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, message)| message.as_str())
    }

    #[must_use]
    pub fn form(&self) -> &[String] {
        &self.form
    }
}

fn validate_credentials(errors: &mut FormErrors, email: &str, password: &str) {
    if email.trim().is_empty() {
        errors.add_field("Email", EMAIL_REQUIRED);
    } else if !valid_email(email) {
        errors.add_field("Email", EMAIL_INVALID);
    }
    if password.is_empty() {
        errors.add_field("Password", PASSWORD_REQUIRED);
    }
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct RegisterForm {
    #[serde(rename = "FirstName")]
    pub first_name: String,
    #[serde(rename = "LastName")]
    pub last_name: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "ConfirmPassword")]
    pub confirm_password: String,
    #[serde(rename = "__RequestVerificationToken")]
    pub verification_token: String,
}

impl RegisterForm {
    #[must_use]
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        validate_credentials(&mut errors, &self.email, &self.password);
        if self.confirm_password != self.password {
            errors.add_field("ConfirmPassword", PASSWORD_MISMATCH);
        }
        errors
    }

    /// Transient user for this registration; the user name is the email.
    #[must_use]
    pub fn to_user(&self) -> User {
        User::new(&self.email, &self.email)
            .with_names(non_empty(&self.first_name), non_empty(&self.last_name))
    }
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginForm {
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "RememberMe")]
    pub remember_me: String,
    #[serde(rename = "ReturnUrl", alias = "returnUrl")]
    pub return_url: Option<String>,
    #[serde(rename = "__RequestVerificationToken")]
    pub verification_token: String,
}

impl LoginForm {
    #[must_use]
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        validate_credentials(&mut errors, &self.email, &self.password);
        errors
    }

    #[must_use]
    pub fn remember_me(&self) -> bool {
        matches!(
            self.remember_me.to_ascii_lowercase().as_str(),
            "true" | "on" | "1"
        )
    }
}

/// Only the anti-forgery token is posted on logout.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct LogoutForm {
    #[serde(rename = "__RequestVerificationToken")]
    pub verification_token: String,
}

/// `returnUrl` as it arrives on the query string.
#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(default)]
pub struct ReturnUrlQuery {
    /// Local path to return to after sign-in
    #[serde(rename = "returnUrl", alias = "ReturnUrl")]
    pub return_url: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(email: &str, password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
            ..RegisterForm::default()
        }
    }

    #[test]
    fn register_requires_email_and_password() {
        let errors = register("", "", "").validate();
        assert!(!errors.is_valid());
        assert_eq!(errors.field("Email"), Some(EMAIL_REQUIRED));
        assert_eq!(errors.field("Password"), Some(PASSWORD_REQUIRED));
        assert_eq!(errors.field("ConfirmPassword"), None);
    }

    #[test]
    fn register_rejects_malformed_email() {
        let errors = register("not-an-email", "Secret1!", "Secret1!").validate();
        assert_eq!(errors.field("Email"), Some(EMAIL_INVALID));
    }

    #[test]
    fn register_rejects_mismatched_confirmation() {
        let errors = register("a@example.com", "Secret1!", "Secret2!").validate();
        assert_eq!(errors.field("ConfirmPassword"), Some(PASSWORD_MISMATCH));
        assert_eq!(errors.field("Email"), None);
    }

    #[test]
    fn register_valid_input() {
        assert!(register("a@example.com", "Secret1!", "Secret1!")
            .validate()
            .is_valid());
    }

    #[test]
    fn register_maps_email_to_user_name() {
        let form = RegisterForm {
            first_name: " Ada ".to_string(),
            ..register("Ada@Example.com", "Secret1!", "Secret1!")
        };
        let user = form.to_user();
        assert_eq!(user.user_name, "Ada@Example.com");
        assert_eq!(user.email, "Ada@Example.com");
        assert_eq!(user.first_name.as_deref(), Some("Ada"));
        assert_eq!(user.last_name, None);
    }

    #[test]
    fn login_validation_and_remember_me() {
        let form = LoginForm {
            email: "a@example.com".to_string(),
            password: "x".to_string(),
            remember_me: "true".to_string(),
            ..LoginForm::default()
        };
        assert!(form.validate().is_valid());
        assert!(form.remember_me());
        assert!(!LoginForm::default().remember_me());
        assert_eq!(
            LoginForm::default().validate().field("Email"),
            Some(EMAIL_REQUIRED)
        );
    }

    #[test]
    fn form_level_messages_keep_order() {
        let mut errors = FormErrors::default();
        errors.add_form("first");
        errors.add_form("second");
        assert_eq!(errors.form(), ["first".to_string(), "second".to_string()]);
        assert!(!errors.is_valid());
    }
}
