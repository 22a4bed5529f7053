//! Account input rules shared by registration, password change and reset.

use std::sync::OnceLock;

use regex_lite::Regex;

use crate::error::ValidationError;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 20;
pub const PASSWORD_MIN: usize = 8;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("email regex is valid")
    })
}

/// Returns the trimmed username.
pub fn validate_username(username: &str) -> Result<&str, ValidationError> {
    let name = username.trim();
    let len = name.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(ValidationError::UsernameLength {
            min: USERNAME_MIN,
            max: USERNAME_MAX,
        });
    }
    Ok(name)
}

/// Returns the email trimmed and lowercased, the form it is stored in.
pub fn normalize_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim().to_lowercase();
    if !email_regex().is_match(&email) {
        return Err(ValidationError::InvalidEmail { value: email });
    }
    Ok(email)
}

pub fn validate_new_password(password: &str, confirm: &str) -> Result<(), ValidationError> {
    let long_enough = password.chars().count() >= PASSWORD_MIN;
    let has_letter = password.chars().any(char::is_alphabetic);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(long_enough && has_letter && has_digit) {
        return Err(ValidationError::WeakPassword { min: PASSWORD_MIN });
    }
    if password != confirm {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_length() {
        assert_eq!(validate_username("  ada  ").unwrap(), "ada");
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"x".repeat(21)).is_err());
        assert!(validate_username(&"x".repeat(20)).is_ok());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" Ada@Example.COM ").unwrap(), "ada@example.com");
        for bad in ["ada", "ada@", "@example.com", "ada@example", "a da@example.com"] {
            assert!(normalize_email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_new_password("hunter22x", "hunter22x").is_ok());
        assert_eq!(
            validate_new_password("short1", "short1"),
            Err(ValidationError::WeakPassword { min: PASSWORD_MIN })
        );
        assert!(validate_new_password("lettersonly", "lettersonly").is_err());
        assert!(validate_new_password("12345678", "12345678").is_err());
        assert_eq!(
            validate_new_password("hunter22x", "hunter22y"),
            Err(ValidationError::PasswordMismatch)
        );
    }
}
