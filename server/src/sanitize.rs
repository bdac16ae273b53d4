//! Display-name sanitization
//!
//! Names end up in other players' HTML views, so anything that could open a
//! tag, an attribute or a script URL is stripped. Sanitizing never fails: input
//! that ends up empty falls back to the default name.

use shared::{DEFAULT_PLAYER_NAME, MAX_NAME_LEN};

const FORBIDDEN_CHARS: [char; 7] = ['<', '>', '"', '\'', '&', '/', '\\'];

pub fn sanitize_name(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !FORBIDDEN_CHARS.contains(c)).collect();
    let stripped = remove_ignore_case(&stripped, "javascript:");
    let stripped = remove_event_handlers(&stripped);
    let stripped = remove_ignore_case(&stripped, "script");

    let name: String = stripped.trim().chars().take(MAX_NAME_LEN).collect();
    if name.is_empty() {
        DEFAULT_PLAYER_NAME.to_string()
    } else {
        name
    }
}

/// Removes every non-overlapping occurrence of an ASCII `pattern`, in a
/// single left-to-right pass.
fn remove_ignore_case(input: &str, pattern: &str) -> String {
    let bytes = input.as_bytes();
    let needle = pattern.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut start = 0;
    let mut i = 0;

    while i + needle.len() <= bytes.len() {
        if bytes[i..i + needle.len()].eq_ignore_ascii_case(needle) {
            out.push_str(&input[start..i]);
            i += needle.len();
            start = i;
        } else {
            i += 1;
        }
    }
    out.push_str(&input[start..]);
    out
}

/// Removes `on<word>=` attribute openers such as `onclick=`.
fn remove_event_handlers(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut start = 0;
    let mut i = 0;

    while i + 1 < bytes.len() {
        if bytes[i..i + 2].eq_ignore_ascii_case(b"on") {
            let mut end = i + 2;
            while end < bytes.len() && is_word_byte(bytes[end]) {
                end += 1;
            }
            if end > i + 2 && end < bytes.len() && bytes[end] == b'=' {
                out.push_str(&input[start..i]);
                i = end + 1;
                start = i;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&input[start..]);
    out
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
