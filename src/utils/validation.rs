use chrono::{DateTime, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

/// Minimum length of a user-chosen password
pub const MIN_PASSWORD_LENGTH: usize = 8;

static CIN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{1,2}[0-9]+$").expect("valid CIN regex"));

static GREY_CARD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+-[A-Za-z]-[0-9]+$").expect("valid grey card regex"));

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// One or two letters followed by digits, e.g. `AB12345`.
pub fn validate_cin(cin: &str) -> Result<(), ValidationError> {
    if CIN_PATTERN.is_match(cin) {
        Ok(())
    } else {
        Err(ValidationError::new("INVALID_CIN", "Invalid CIN format"))
    }
}

/// Digits, a single letter, digits, separated by hyphens, e.g. `123-A-456`.
pub fn validate_grey_card(number: &str) -> Result<(), ValidationError> {
    if GREY_CARD_PATTERN.is_match(number) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "INVALID_GREY_CARD",
            "Invalid Grey Card format",
        ))
    }
}

/// Password policy for user-chosen passwords
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::new(
            "WEAK_PASSWORD",
            format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            ),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new(
            "WEAK_PASSWORD",
            "Password must contain at least one digit",
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(ValidationError::new(
            "WEAK_PASSWORD",
            "Password must contain at least one uppercase letter",
        ));
    }
    Ok(())
}

/// Plant names become directory names under the uploads root.
pub fn validate_plant_name(plant: &str) -> Result<(), ValidationError> {
    let trimmed = plant.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("INVALID_PLANT", "Plant must not be empty"));
    }
    if trimmed != plant
        || plant.starts_with('.')
        || plant.contains(['/', '\\', '\0'])
        || plant.contains("..")
    {
        return Err(ValidationError::new(
            "INVALID_PLANT",
            format!("Plant name '{}' contains forbidden characters", plant),
        ));
    }
    Ok(())
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp (the date part is kept).
pub fn parse_date_of_birth(value: &str) -> Result<NaiveDate, ValidationError> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.date_naive());
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.date());
    }
    Err(ValidationError::new(
        "INVALID_DATE",
        format!("Invalid date of birth '{}'", value),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cin_pattern() {
        assert!(validate_cin("A1").is_ok());
        assert!(validate_cin("AB12345").is_ok());
        assert!(validate_cin("1A").is_err());
        assert!(validate_cin("ABC123").is_err());
        assert!(validate_cin("AB").is_err());
        assert!(validate_cin("").is_err());
    }

    #[test]
    fn test_grey_card_pattern() {
        assert!(validate_grey_card("1-A-2").is_ok());
        assert!(validate_grey_card("123-b-456").is_ok());
        assert!(validate_grey_card("1A2").is_err());
        assert!(validate_grey_card("1-AB-2").is_err());
        assert!(validate_grey_card("-A-2").is_err());
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password_strength("NewPassword123").is_ok());

        let short = validate_password_strength("Ab1").unwrap_err();
        assert!(short.message.contains("at least 8"));

        let no_digit = validate_password_strength("Abcdefghij").unwrap_err();
        assert!(no_digit.message.contains("digit"));

        let no_upper = validate_password_strength("abcdefgh1").unwrap_err();
        assert!(no_upper.message.contains("uppercase"));
    }

    #[test]
    fn test_plant_names() {
        assert!(validate_plant_name("Plant1").is_ok());
        assert!(validate_plant_name("Main Plant").is_ok());
        assert!(validate_plant_name("").is_err());
        assert!(validate_plant_name("  ").is_err());
        assert!(validate_plant_name("../etc").is_err());
        assert!(validate_plant_name("a/b").is_err());
        assert!(validate_plant_name(".hidden").is_err());
    }

    #[test]
    fn test_date_of_birth_formats() {
        let expected = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        assert_eq!(parse_date_of_birth("1990-01-01").unwrap(), expected);
        assert_eq!(
            parse_date_of_birth("1990-01-01T00:00:00Z").unwrap(),
            expected
        );
        assert_eq!(parse_date_of_birth("1990-01-01T08:30:00").unwrap(), expected);
        assert!(parse_date_of_birth("01/01/1990").is_err());
    }
}
