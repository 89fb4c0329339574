//! Node name validation and filename sanitization.
//!
//! [`validate`] is the strict gate every node name passes through: a name is
//! accepted only if it survives path normalization as exactly one segment,
//! unchanged. [`sanitize`] is the lenient counterpart used on titles coming
//! from a provider; it strips whatever a filesystem would refuse and never
//! fails.

use std::path::{Component, Path};

use crate::error::{ErrorKind, Result};

const FALLBACK_NAME: &str = "_";
// Keep a little headroom below the usual 255-byte limit for the index
// prefix and extension that get added around a title.
const MAX_NAME_BYTES: usize = 200;

/// Validates a single node name.
///
/// Rejects path separators, `.`/`..`, null bytes and anything that doesn't
/// round-trip through normalization as one [`Component::Normal`].
///
/// # Examples
///
/// ```
/// use novelsync_storage::validate_name;
/// assert!(validate_name("001 Prologue.txt").is_ok());
/// assert!(validate_name("..").is_err());
/// assert!(validate_name("a/b").is_err());
/// assert!(validate_name("trailing/").is_err());
/// assert!(validate_name("").is_err());
/// ```
pub fn validate(name: &str) -> Result<&str> {
    if name.as_bytes().contains(&0) || name.contains('\\') {
        exn::bail!(ErrorKind::InvalidName(name.to_string()));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(segment)), None) if segment == name => Ok(name),
        _ => exn::bail!(ErrorKind::InvalidName(name.to_string())),
    }
}

/// Turns an arbitrary title into something usable as a single file or folder
/// name.
///
/// Characters illegal on common filesystems are removed, runs of whitespace
/// collapse into a single space, and trailing dots/spaces are trimmed.
/// Returns `"_"` when nothing usable is left.
///
/// # Examples
///
/// ```
/// use novelsync_storage::sanitize_name;
/// assert_eq!(sanitize_name("Chapter 1: Begin?"), "Chapter 1 Begin");
/// assert_eq!(sanitize_name("  a \t b  "), "a b");
/// assert_eq!(sanitize_name("???"), "_");
/// ```
pub fn sanitize(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_space = false;
    for ch in title.chars() {
        if matches!(ch, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || ch.is_control() && !ch.is_whitespace()
        {
            continue;
        }
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(ch);
    }
    truncate_at_char_boundary(&mut out, MAX_NAME_BYTES);
    let trimmed = out.trim_end_matches(['.', ' ']);
    if trimmed.is_empty() || is_reserved(trimmed) {
        return match trimmed.is_empty() {
            true => FALLBACK_NAME.to_string(),
            false => format!("{FALLBACK_NAME}{trimmed}"),
        };
    }
    trimmed.to_string()
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

// Device names Windows refuses regardless of extension.
fn is_reserved(name: &str) -> bool {
    let base = name.split('.').next().unwrap_or(name).to_ascii_uppercase();
    match base.as_str() {
        "CON" | "PRN" | "AUX" | "NUL" => true,
        _ => base
            .strip_prefix("COM")
            .or_else(|| base.strip_prefix("LPT"))
            .is_some_and(|n| n.len() == 1 && matches!(n.as_bytes()[0], b'1'..=b'9')),
    }
}
