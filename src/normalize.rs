const MAX_SLUG_CHARS: usize = 50;

/// Strips the `="..."` wrapper spreadsheet exports put around ISBN cells.
pub fn clean_isbn(raw: &str) -> String {
    let unwrapped = match raw.strip_prefix('=') {
        Some(rest) => rest.strip_prefix('"').unwrap_or(rest),
        None => raw,
    };
    let unwrapped = unwrapped.strip_suffix('"').unwrap_or(unwrapped);
    unwrapped.trim().to_owned()
}

/// Stable cover filename for a book. This is the ledger key, so it must not
/// depend on anything but its inputs.
pub fn cover_filename(book_id: &str, title: &str) -> String {
    if !book_id.is_empty() {
        return format!("{book_id}.jpg");
    }

    let mut slug = String::with_capacity(title.len());
    let mut in_whitespace = false;
    for ch in title.to_lowercase().chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                slug.push('-');
            }
            in_whitespace = true;
            continue;
        }
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            slug.push(ch);
            in_whitespace = false;
        }
    }

    let slug: String = slug.chars().take(MAX_SLUG_CHARS).collect();
    format!("{slug}.jpg")
}
