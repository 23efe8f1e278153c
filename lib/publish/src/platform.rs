//! The fixed per-platform constraint table.
//!
//! Limits mirror each platform's documented posting constraints. The table
//! is closed: adding a platform is a code change, not configuration.

use amber_relay_workflow::Platform;
use serde::{Deserialize, Serialize};

/// Documented posting constraints for a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConstraints {
    /// Maximum post length in characters.
    pub max_chars: usize,
    /// Maximum number of attached media items.
    pub max_media: usize,
    /// Whether a post must carry at least one media item.
    pub requires_media: bool,
}

/// Returns the constraint row for a platform.
#[must_use]
pub fn constraints(platform: Platform) -> PlatformConstraints {
    match platform {
        Platform::LinkedIn => PlatformConstraints {
            max_chars: 3000,
            max_media: 9,
            requires_media: false,
        },
        Platform::X => PlatformConstraints {
            max_chars: 280,
            max_media: 4,
            requires_media: false,
        },
        Platform::Mastodon => PlatformConstraints {
            max_chars: 500,
            max_media: 4,
            requires_media: false,
        },
        Platform::Instagram => PlatformConstraints {
            max_chars: 2200,
            max_media: 10,
            requires_media: true,
        },
        Platform::Facebook => PlatformConstraints {
            max_chars: 63206,
            max_media: 10,
            requires_media: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linkedin_limits() {
        let row = constraints(Platform::LinkedIn);
        assert_eq!(row.max_chars, 3000);
        assert!(!row.requires_media);
    }

    #[test]
    fn instagram_requires_media() {
        assert!(constraints(Platform::Instagram).requires_media);
    }

    #[test]
    fn every_platform_has_positive_limits() {
        for platform in [
            Platform::LinkedIn,
            Platform::X,
            Platform::Mastodon,
            Platform::Instagram,
            Platform::Facebook,
        ] {
            let row = constraints(platform);
            assert!(row.max_chars > 0);
            assert!(row.max_media > 0);
        }
    }
}
