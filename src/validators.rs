use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::auth::Role;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex"));
static BP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^BRG\d{8}$").expect("valid BP regex"));
static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9._-]").expect("valid filename regex"));

pub const PROJECT_AREAS: [&str; 8] = [
    "Ciências Exatas e da Terra",
    "Ciências Biológicas",
    "Engenharias",
    "Ciências da Saúde",
    "Ciências Agrárias",
    "Ciências Sociais Aplicadas",
    "Ciências Humanas",
    "Linguística, Letras e Artes",
];

pub const FIRST_EDITION_YEAR: i32 = 2010;

/// A rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::new("email", "Invalid e-mail address"))
    }
}

/// School registration code, `BRG` followed by 8 digits. Returned uppercased.
pub fn normalize_bp(bp: &str) -> Result<String, ValidationError> {
    let bp = bp.trim().to_uppercase();
    if BP.is_match(&bp) {
        Ok(bp)
    } else {
        Err(ValidationError::new("bp", "BP must be BRG followed by 8 digits"))
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let fail = |message: &str| Err(ValidationError::new("password", message));

    if password.chars().count() < 8 {
        return fail("Password must have at least 8 characters");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return fail("Password must contain an uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return fail("Password must contain a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return fail("Password must contain a digit");
    }
    Ok(())
}

pub fn validate_area(area: &str) -> Result<(), ValidationError> {
    if PROJECT_AREAS.contains(&area) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "area",
            format!("Area must be one of: {}", PROJECT_AREAS.join("; ")),
        ))
    }
}

/// Fair editions run from 2010 up to next year's.
pub fn validate_edition_year(year: i32, current_year: i32) -> Result<(), ValidationError> {
    if (FIRST_EDITION_YEAR..=current_year + 1).contains(&year) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "year",
            format!("Year must be between {} and {}", FIRST_EDITION_YEAR, current_year + 1),
        ))
    }
}

pub fn parse_role(role: &str) -> Result<Role, ValidationError> {
    role.parse()
        .map_err(|_| ValidationError::new("role", "Role must be participant, advisor or admin"))
}

pub fn require_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ValidationError::new(field, format!("{} is required", field)))
    } else {
        Ok(value.to_string())
    }
}

pub fn sanitize_filename(name: &str) -> String {
    UNSAFE_FILENAME_CHARS.replace_all(name.trim(), "_").into_owned()
}
