use std::borrow::Cow;

use validator::ValidationError;

/// Letters, digits and `.@+-_`, the same alphabet account names have always allowed.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let valid = !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'));

    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("username").with_message(Cow::Borrowed(
            "Username may contain only letters, digits and @/./+/-/_",
        )))
    }
}

/// ASCII letters, digits, hyphens and underscores.
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let valid = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("slug").with_message(Cow::Borrowed(
            "Slug may contain only latin letters, digits, hyphens and underscores",
        )))
    }
}

/// Six hex digits with an optional leading `#`.
pub fn validate_color(color: &str) -> Result<(), ValidationError> {
    let digits = color.strip_prefix('#').unwrap_or(color);
    let valid = digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit());

    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("color")
            .with_message(Cow::Borrowed("Color must be a hex value such as F5F5FF")))
    }
}

/// Escape `LIKE` wildcards so user input only ever matches literally.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
