//! Telegram HTML rendering of forwarded SMS.

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Bold sender on the first line, body below.
pub fn format_message(number: &str, text: &str) -> String {
    format!("<b>{}</b>\n{}", escape_html(number), escape_html(text))
}
