// ============================
// crates/backend-lib/src/validation.rs
// ============================
//! Inbound payload validation and track-title sanitization.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ContestError;

const MAX_LINK_LENGTH: usize = 2048;

static TRACK_LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(on\.|m\.)?soundcloud\.com/\S+$").unwrap()
});

/// Check a submitted track link before it goes anywhere near the media
/// source. A rejection surfaces to the submitter as an `error` event,
/// the same as a lookup that fails upstream.
pub fn validate_track_link(link: &str) -> Result<&str, ContestError> {
    if link.is_empty() {
        return Err(ContestError::TrackLookupFailed(
            "track link must not be empty".to_string(),
        ));
    }
    if link.len() > MAX_LINK_LENGTH {
        return Err(ContestError::TrackLookupFailed(
            "track link is too long".to_string(),
        ));
    }
    if !TRACK_LINK_REGEX.is_match(link) {
        return Err(ContestError::TrackLookupFailed(
            "track link must be a soundcloud.com URL".to_string(),
        ));
    }
    Ok(link)
}

/// Turn a track title into a filesystem- and URL-safe submission id.
///
/// Keeps alphanumerics, spaces become dashes, everything else is
/// dropped. Empty results fall back to "track" so a title of pure
/// punctuation still produces a usable id.
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_dash = true; // suppress a leading dash
    for c in title.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if (c.is_whitespace() || c == '-') && !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        "track".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_track_link() {
        assert!(validate_track_link("https://soundcloud.com/artist/track").is_ok());
        assert!(validate_track_link("https://on.soundcloud.com/abc123").is_ok());

        assert!(validate_track_link("").is_err());
        assert!(validate_track_link("http://soundcloud.com/artist/track").is_err());
        assert!(validate_track_link("https://example.com/artist/track").is_err());
        assert!(validate_track_link("not a link").is_err());

        let long = format!("https://soundcloud.com/{}", "a".repeat(3000));
        assert!(validate_track_link(&long).is_err());
    }

    #[test]
    fn test_rejected_link_is_not_silently_dropped() {
        let err = validate_track_link("https://example.com/artist/track").unwrap_err();
        assert!(matches!(err, ContestError::TrackLookupFailed(_)));
        assert!(!err.is_silent());
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("My Track"), "my-track");
        assert_eq!(sanitize_title("  Spaced   Out  "), "spaced-out");
        assert_eq!(sanitize_title("DJ_Quokka - Set #4 (live!)"), "dj_quokka-set-4-live");
        assert_eq!(sanitize_title("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_title("!!!"), "track");
        assert_eq!(sanitize_title(""), "track");
    }
}
