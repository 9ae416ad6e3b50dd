// Input validation for signup and password reset

use std::collections::HashMap;

/// Default password minimum length
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const MAX_NAME_LENGTH: usize = 100;

/// Lower-cases and trims an email so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email_format(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email cannot be empty".to_string());
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err("Invalid email format".to_string());
    }

    let domain = parts[1];
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err("Invalid email format".to_string());
    }

    if email.chars().any(char::is_whitespace) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Name cannot be empty".to_string());
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(format!("Name must be at most {} characters", MAX_NAME_LENGTH));
    }
    Ok(())
}

/// Collects per-field failures for a signup profile; empty when valid.
pub fn validate_signup(name: &str, email: &str, password: &str) -> HashMap<String, String> {
    let mut field_errors = HashMap::new();
    if let Err(e) = validate_name(name) {
        field_errors.insert("name".to_string(), e);
    }
    if let Err(e) = validate_email_format(&normalize_email(email)) {
        field_errors.insert("email".to_string(), e);
    }
    if let Err(e) = validate_password(password) {
        field_errors.insert("password".to_string(), e);
    }
    field_errors
}
