//! Message identity and filesystem naming.
//!
//! A message's identity is a digest of its folder name and server message
//! number. It is recomputed on every run and stored only as the cache's
//! primary key; folder renames or server UID renumbering therefore produce
//! new identities, and the old record becomes an orphan.

use sha1::{Digest, Sha1};

use maildump_imap::Uid;

/// Maximum length of the sanitized title embedded in a dump filename.
pub const TITLE_MAX_LEN: usize = 16;

/// Compute the stable identity of a message: the hex-encoded 20-byte digest
/// of `{folder}_{uid}`.
///
/// Deterministic for identical inputs across runs and platforms.
#[must_use]
pub fn generate_id(folder: &str, uid: Uid) -> String {
    let mut hasher = Sha1::new();
    hasher.update(folder.as_bytes());
    hasher.update(b"_");
    hasher.update(uid.to_string().as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Reduce a subject line to a filesystem-safe fragment: drop non-ASCII
/// characters, turn spaces into underscores, keep only `[A-Za-z0-9_-]`,
/// truncate to `max_len` and trim trailing underscores.
///
/// Empty input yields empty output.
#[must_use]
pub fn sanitize_title(raw: &str, max_len: usize) -> String {
    let mut cleaned = String::with_capacity(raw.len().min(max_len));
    for c in raw.chars() {
        if !c.is_ascii() {
            continue;
        }
        let c = if c == ' ' { '_' } else { c };
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            cleaned.push(c);
        }
        if cleaned.len() == max_len {
            break;
        }
    }
    // only ASCII left, so the cut above is always on a char boundary
    cleaned.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn id_is_stable() {
        let a = generate_id("INBOX", 42);
        let b = generate_id("INBOX", 42);
        assert_eq!(a, b);
    }

    #[test]
    fn id_is_forty_hex_chars() {
        let id = generate_id("INBOX/Sub folder", 7);
        assert_eq!(id.len(), 40);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn id_depends_on_both_inputs() {
        let base = generate_id("INBOX", 1);
        assert_ne!(base, generate_id("INBOX", 2));
        assert_ne!(base, generate_id("Sent", 1));
    }

    #[test]
    fn sanitize_drops_non_ascii_and_punctuation() {
        assert_eq!(sanitize_title("Hello World! 日本語", 16), "Hello_World");
    }

    #[test]
    fn sanitize_truncates_and_trims_trailing_underscore() {
        assert_eq!(sanitize_title("a b c d e f g h i", 4), "a_b");
        assert_eq!(sanitize_title("underscore ", 16), "underscore");
    }

    #[test]
    fn sanitize_keeps_dashes() {
        assert_eq!(sanitize_title("re: invoice-123", 16), "re_invoice-123");
    }

    #[test]
    fn sanitize_empty_is_empty() {
        assert_eq!(sanitize_title("", 16), "");
        assert_eq!(sanitize_title("日本語", 16), "");
    }

    proptest! {
        #[test]
        fn sanitize_output_is_always_safe(raw in "\\PC*", max_len in 0usize..64) {
            let out = sanitize_title(&raw, max_len);
            prop_assert!(out.len() <= max_len);
            prop_assert!(out.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
            prop_assert!(!out.ends_with('_'));
        }
    }
}
