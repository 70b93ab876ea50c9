use chrono::DateTime;

/// Helper function to format a backend timestamp for display
///
/// The backend reports `refill` and `updated` as ISO 8601 strings. This
/// formats them as "dd Mon yyyy" for chat output and falls back to the
/// verbatim string when the value does not parse.
///
/// # Arguments
///
/// * `iso` - The timestamp string exactly as the backend sent it
///
/// # Returns
///
/// A `String` containing the formatted date, or the input unchanged
pub fn format_timestamp(iso: &str) -> String {
    match DateTime::parse_from_rfc3339(iso) {
        Ok(timestamp) => timestamp.format("%d %b %Y").to_string(),
        Err(_) => iso.to_string(),
    }
}

/// Helper function to escape special characters for Markdown
///
/// Telegram's MarkdownV2 mode reserves a set of punctuation characters;
/// this prefixes each of them with a backslash so user-supplied text is
/// rendered literally.
///
/// # Arguments
///
/// * `text` - A string slice containing the text to be escaped
///
/// # Returns
///
/// A `String` with all Markdown special characters escaped
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if "_*[]()~`>#+-=|{}.!".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_backend_timestamps() {
        assert_eq!(format_timestamp("2024-01-08T00:00:00Z"), "08 Jan 2024");
    }

    #[test]
    fn unparseable_timestamps_pass_through_verbatim() {
        assert_eq!(format_timestamp("soon"), "soon");
    }

    #[test]
    fn escapes_reserved_markdown_characters() {
        assert_eq!(escape_markdown("1.5 units"), "1\\.5 units");
        assert_eq!(escape_markdown("Vitamin-D"), "Vitamin\\-D");
        assert_eq!(escape_markdown("plain"), "plain");
    }
}
