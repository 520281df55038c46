use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    /// Only issued by the remote backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

#[derive(Clone, Deserialize)]
pub struct UserCredentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,
    #[error("Passwords do not match")]
    PasswordMismatch,
}

impl UserCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Sign-in check. Existing passwords are never length-checked.
    pub fn validate_email(&self) -> Result<(), CredentialsError> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(CredentialsError::InvalidEmail);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), CredentialsError> {
        self.validate_email()?;

        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CredentialsError::PasswordTooShort);
        }

        Ok(())
    }

    /// Sign-up form check: the repeated password, when given, must match.
    pub fn validate_sign_up(&self, confirm_password: Option<&str>) -> Result<(), CredentialsError> {
        if let Some(confirm_password) = confirm_password
            && confirm_password != self.password
        {
            return Err(CredentialsError::PasswordMismatch);
        }

        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_sign_up_form() {
        let credentials = UserCredentials::new("a@x.com", "secret1");
        assert_eq!(credentials.validate_sign_up(Some("secret1")), Ok(()));
        assert_eq!(credentials.validate_sign_up(None), Ok(()));
        assert_eq!(
            credentials.validate_sign_up(Some("secret2")),
            Err(CredentialsError::PasswordMismatch)
        );

        assert_eq!(
            UserCredentials::new("a@x.com", "12345").validate(),
            Err(CredentialsError::PasswordTooShort)
        );
        assert_eq!(
            UserCredentials::new("  ", "secret1").validate(),
            Err(CredentialsError::InvalidEmail)
        );
    }

    #[test]
    fn sign_in_check_ignores_password_length() {
        assert_eq!(UserCredentials::new("a@x.com", "123").validate_email(), Ok(()));
        assert_eq!(
            UserCredentials::new("nope", "secret1").validate_email(),
            Err(CredentialsError::InvalidEmail)
        );
    }

    #[test]
    fn debug_output_hides_password() {
        let credentials = UserCredentials::new("a@x.com", "secret1");

        assert!(!format!("{credentials:?}").contains("secret1"));
    }
}
