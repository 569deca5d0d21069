use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
use url::Url;

/// Derives a display site name from a base URL: the hostname when the URL
/// parses, the raw string otherwise.
pub fn site_name_from_base(base_url: &str) -> String {
    Url::parse(base_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| base_url.to_string())
}

/// Truncates a string to at most `max_width` display columns, appending an
/// ellipsis, without splitting multi-byte characters.
pub fn truncate_str(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }

    let mut truncated = String::new();
    let mut used = 0;
    for c in s.chars() {
        let char_width = c.width().unwrap_or(1);
        if used + char_width + 3 > max_width {
            break;
        }
        truncated.push(c);
        used += char_width;
    }
    truncated.push_str("...");
    truncated
}
