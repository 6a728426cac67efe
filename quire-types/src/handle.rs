//! URL-safe handles derived from display names.

/// Longest handle produced by [`create_handle`].
pub const MAX_HANDLE_LENGTH: usize = 255;

/// Derives a lowercase, dash-separated handle from arbitrary text.
///
/// Alphanumeric characters are kept (lowercased), every run of anything else
/// collapses into a single `-`, and leading/trailing dashes are dropped.
/// `"Hello, World!"` becomes `"hello-world"`.
#[must_use]
pub fn create_handle(text: &str) -> String {
    let mut handle = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_alphanumeric() || c == '_' {
            if pending_dash && !handle.is_empty() {
                handle.push('-');
            }
            pending_dash = false;
            handle.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
        if handle.chars().count() >= MAX_HANDLE_LENGTH {
            break;
        }
    }

    if handle.chars().count() > MAX_HANDLE_LENGTH {
        handle = handle.chars().take(MAX_HANDLE_LENGTH).collect();
    }
    handle.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_collapses() {
        assert_eq!(create_handle("Hello, World!"), "hello-world");
        assert_eq!(create_handle("  --Leading and trailing--  "), "leading-and-trailing");
    }

    #[test]
    fn unicode_letters_survive() {
        assert_eq!(create_handle("Café Crème"), "café-crème");
    }

    #[test]
    fn empty_and_symbol_only() {
        assert_eq!(create_handle(""), "");
        assert_eq!(create_handle("!!!"), "");
    }

    #[test]
    fn length_is_capped() {
        let long = "a".repeat(400);
        assert_eq!(create_handle(&long).len(), MAX_HANDLE_LENGTH);
    }
}
