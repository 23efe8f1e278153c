//! Pure content formatting against platform constraints.
//!
//! `format_content` maps raw node output onto a platform's constraint row
//! with deterministic rules: character-boundary truncation terminated by an
//! ellipsis, media lists capped at the platform maximum. Content that cannot
//! be made compliant is a [`FormatError`], never a silently degraded post.

use crate::error::FormatError;
use crate::platform::constraints;
use amber_relay_workflow::{ContentValue, MediaRef, Platform};
use serde::{Deserialize, Serialize};

/// A post shaped to a platform's constraints, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedPost {
    /// The target platform.
    pub platform: Platform,
    /// Post text (possibly empty for media-only posts).
    pub text: String,
    /// Attached media, capped at the platform maximum.
    pub media: Vec<MediaRef>,
}

/// Formats raw content for a platform.
///
/// If the text already fits it is passed through unchanged; otherwise it is
/// truncated on a character boundary with an ellipsis terminator. Media
/// beyond the platform maximum is dropped from the tail.
///
/// # Errors
///
/// Returns an error when nothing publishable remains or a required media
/// attachment is missing.
pub fn format_content(raw: &ContentValue, platform: Platform) -> Result<FormattedPost, FormatError> {
    let limits = constraints(platform);

    let (text, mut media): (String, Vec<MediaRef>) = match raw {
        ContentValue::Text(text) => (text.clone(), Vec::new()),
        ContentValue::Image(media_ref) | ContentValue::Video(media_ref) => {
            (String::new(), vec![media_ref.clone()])
        }
        ContentValue::Post(draft) => (
            draft.text.clone().unwrap_or_default(),
            draft.media.clone(),
        ),
        ContentValue::Data(value) => {
            let text = match value.as_str() {
                Some(inner) => inner.to_string(),
                None => value.to_string(),
            };
            (text, Vec::new())
        }
    };

    let text = truncate_text(&text, limits.max_chars);
    media.truncate(limits.max_media);

    let post = FormattedPost {
        platform,
        text,
        media,
    };
    validate_content(&post)?;
    Ok(post)
}

/// Validates a formatted post against its platform's constraints.
///
/// Runs before any network call so non-compliant content fails fast rather
/// than wasting an external request.
///
/// # Errors
///
/// Returns the first constraint the post violates.
pub fn validate_content(post: &FormattedPost) -> Result<(), FormatError> {
    let limits = constraints(post.platform);
    let length = post.text.chars().count();

    if length > limits.max_chars {
        return Err(FormatError::TextTooLong {
            platform: post.platform,
            length,
            limit: limits.max_chars,
        });
    }
    if post.media.len() > limits.max_media {
        return Err(FormatError::TooManyMedia {
            platform: post.platform,
            count: post.media.len(),
            limit: limits.max_media,
        });
    }
    if limits.requires_media && post.media.is_empty() {
        return Err(FormatError::MediaRequired {
            platform: post.platform,
        });
    }
    if post.text.trim().is_empty() && post.media.is_empty() {
        return Err(FormatError::EmptyContent {
            platform: post.platform,
        });
    }
    Ok(())
}

/// Deterministic character-boundary truncation.
///
/// Text at or under the limit is returned unchanged; longer text keeps the
/// first `max_chars - 1` characters and terminates with an ellipsis.
fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut kept: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    kept.push('…');
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use amber_relay_workflow::PostDraft;

    #[test]
    fn short_text_passes_through_unchanged() {
        let raw = ContentValue::Text("a".repeat(300));
        let post = format_content(&raw, Platform::LinkedIn).unwrap();
        assert_eq!(post.text.chars().count(), 300);
        assert_eq!(post.text, "a".repeat(300));
    }

    #[test]
    fn long_text_is_truncated_to_the_limit() {
        for length in [281usize, 500, 10_000] {
            let raw = ContentValue::Text("x".repeat(length));
            let post = format_content(&raw, Platform::X).unwrap();
            assert!(post.text.chars().count() <= 280, "length {length}");
            assert!(post.text.ends_with('…'));
        }
    }

    #[test]
    fn formatted_length_never_exceeds_limit() {
        for length in [0usize, 1, 279, 280, 281, 3000, 3001, 9000] {
            let raw = ContentValue::Text("y".repeat(length));
            for platform in [Platform::X, Platform::LinkedIn, Platform::Mastodon] {
                let limit = constraints(platform).max_chars;
                match format_content(&raw, platform) {
                    Ok(post) => {
                        assert!(post.text.chars().count() <= limit);
                        if length <= limit {
                            assert_eq!(post.text.chars().count(), length, "unchanged under limit");
                        }
                    }
                    // Zero-length text with no media is correctly rejected.
                    Err(FormatError::EmptyContent { .. }) => assert_eq!(length, 0),
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
        }
    }

    #[test]
    fn truncation_respects_multibyte_boundaries() {
        let raw = ContentValue::Text("é".repeat(600));
        let post = format_content(&raw, Platform::Mastodon).unwrap();
        assert!(post.text.chars().count() <= 500);
    }

    #[test]
    fn media_list_is_capped() {
        let draft = PostDraft {
            text: Some("gallery".to_string()),
            media: (0..8)
                .map(|i| MediaRef::new(format!("img_{i}"), "image/png"))
                .collect(),
        };
        let post = format_content(&ContentValue::Post(draft), Platform::X).unwrap();
        assert_eq!(post.media.len(), 4);
        assert_eq!(post.media[0].key, "img_0");
    }

    #[test]
    fn empty_content_is_rejected() {
        let raw = ContentValue::Text(String::new());
        assert!(matches!(
            format_content(&raw, Platform::LinkedIn),
            Err(FormatError::EmptyContent { .. })
        ));
    }

    #[test]
    fn missing_required_media_is_rejected() {
        let raw = ContentValue::Text("caption only".to_string());
        assert!(matches!(
            format_content(&raw, Platform::Instagram),
            Err(FormatError::MediaRequired { .. })
        ));
    }

    #[test]
    fn image_content_formats_as_media_post() {
        let raw = ContentValue::Image(MediaRef::new("img_1", "image/png"));
        let post = format_content(&raw, Platform::Instagram).unwrap();
        assert!(post.text.is_empty());
        assert_eq!(post.media.len(), 1);
    }

    #[test]
    fn json_string_payload_posts_inner_text() {
        let raw = ContentValue::Data(serde_json::json!("from webhook"));
        let post = format_content(&raw, Platform::Mastodon).unwrap();
        assert_eq!(post.text, "from webhook");
    }

    #[test]
    fn validate_rejects_oversized_external_post() {
        let post = FormattedPost {
            platform: Platform::X,
            text: "z".repeat(300),
            media: vec![],
        };
        assert!(matches!(
            validate_content(&post),
            Err(FormatError::TextTooLong { .. })
        ));
    }
}
