//! Input validation for API requests.
//!
//! For collecting multiple validation errors and returning them as an
//! ApiError, use the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

lazy_static! {
    /// Regex for validating email addresses (pragmatic, not RFC-complete)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^@\s]+@[^@\s]+\.[^@\s]+$"
    ).unwrap();

    /// Regex for validating slugs (lowercase alphanumeric with dashes)
    static ref SLUG_REGEX: Regex = Regex::new(
        r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$"
    ).unwrap();
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a store slug
pub fn validate_slug(slug: &str) -> Result<(), String> {
    if slug.is_empty() {
        return Err("Slug is required".to_string());
    }

    if slug.len() > 100 {
        return Err("Slug is too long (max 100 characters)".to_string());
    }

    if !SLUG_REGEX.is_match(slug) {
        return Err(
            "Slug must be lowercase alphanumeric with dashes, starting and ending with alphanumeric".to_string()
        );
    }

    Ok(())
}

/// Validate a display name (stores, products, projects)
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name is required".to_string());
    }

    if name.len() > 200 {
        return Err("Name is too long (max 200 characters)".to_string());
    }

    Ok(())
}

/// Derive a slug from a display name: lowercase, whitespace to dashes,
/// anything outside [a-z0-9-] dropped, runs of dashes collapsed.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if (c.is_whitespace() || c == '-') && !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Parse and normalize a price to an exact decimal with two places.
/// Empty input means "unset". Negative prices are rejected.
pub fn normalize_price(input: &str) -> Result<Option<String>, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let price = Decimal::from_str(trimmed)
        .map_err(|_| format!("Invalid price '{}': expected a decimal number", trimmed))?;

    if price.is_sign_negative() {
        return Err("Price must not be negative".to_string());
    }

    let mut price = price.round_dp(2);
    price.rescale(2);
    Ok(Some(price.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(validate_email("owner@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("two@at@example.com").is_err());
    }

    #[test]
    fn slug_validation() {
        assert!(validate_slug("my-store").is_ok());
        assert!(validate_slug("store1").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("-leading").is_err());
        assert!(validate_slug("trailing-").is_err());
        assert!(validate_slug("UPPER").is_err());
        assert!(validate_slug("with space").is_err());
    }

    #[test]
    fn slugify_derives_url_safe_names() {
        assert_eq!(slugify("My Store"), "my-store");
        assert_eq!(slugify("  Fancy   Shop  "), "fancy-shop");
        assert_eq!(slugify("Café № 9"), "caf-9");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
        assert!(validate_slug(&slugify("My Store")).is_ok());
    }

    #[test]
    fn price_normalization() {
        assert_eq!(normalize_price("10").unwrap(), Some("10.00".to_string()));
        assert_eq!(
            normalize_price("19.999").unwrap(),
            Some("20.00".to_string())
        );
        assert_eq!(normalize_price("  ").unwrap(), None);
        assert!(normalize_price("abc").is_err());
        assert!(normalize_price("-5").is_err());
    }

    #[test]
    fn price_normalization_is_exact() {
        // 0.1 + 0.2 style values survive as exact decimals
        assert_eq!(normalize_price("0.30").unwrap(), Some("0.30".to_string()));
        assert_eq!(normalize_price("0.1").unwrap(), Some("0.10".to_string()));
    }
}
