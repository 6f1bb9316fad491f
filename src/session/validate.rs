// Local fast-fail checks run before any request reaches the auth service.
// The service repeats its own checks; these only save a round trip.

/// Basic email shape check for sign-up and sign-in forms.
pub fn validate_email_format(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email cannot be empty".to_string());
    }

    if email.chars().any(char::is_whitespace) {
        return Err("Invalid email format".to_string());
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err("Invalid email format".to_string());
    }

    let domain = parts[1];
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Minimum length only; counted in characters, not bytes.
pub fn validate_password(password: &str, min_length: usize) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password cannot be empty".to_string());
    }

    if password.chars().count() < min_length {
        return Err(format!("Password must be at least {} characters", min_length));
    }

    Ok(())
}

pub fn validate_full_name(full_name: &str) -> Result<(), String> {
    let name = full_name.trim();
    if name.is_empty() {
        return Err("Full name cannot be empty".to_string());
    }

    if name.chars().count() > 120 {
        return Err("Full name must be less than 120 characters".to_string());
    }

    Ok(())
}

/// Blank phone numbers are dropped rather than stored as empty strings.
pub fn normalize_phone(phone: Option<&str>) -> Option<String> {
    phone.map(str::trim).filter(|p| !p.is_empty()).map(str::to_string)
}
