//! Password handling for CLI operations.

use rpassword::prompt_password;

/// Gets a password from the provided option or prompts the user
pub fn get_password(provided: Option<String>, needed: bool) -> Option<Vec<u8>> {
    if let Some(pwd) = provided {
        return Some(pwd.into_bytes());
    }

    if !needed {
        return None;
    }

    match prompt_password("Enter password: ") {
        Ok(pwd) if !pwd.is_empty() => Some(pwd.into_bytes()),
        _ => None,
    }
}

/// Prompts for password confirmation (for encrypting new entries)
pub fn confirm_password() -> Option<Vec<u8>> {
    let pwd1 = prompt_password("Enter password: ").ok()?;
    if pwd1.is_empty() {
        eprintln!("Password cannot be empty");
        return None;
    }

    let pwd2 = prompt_password("Confirm password: ").ok()?;
    if pwd1 == pwd2 {
        Some(pwd1.into_bytes())
    } else {
        eprintln!("Passwords do not match");
        None
    }
}

/// Uses the provided password or prompts with confirmation
pub fn get_or_confirm_password(provided: Option<String>) -> Option<Vec<u8>> {
    match provided {
        Some(pwd) => Some(pwd.into_bytes()),
        None => confirm_password(),
    }
}
