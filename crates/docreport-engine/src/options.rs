/*
 * options.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Engine settings.

use serde::{Deserialize, Serialize};

/// Settings shared by every build of one engine.
///
/// Deserializes from kebab-case keys; absent keys take the defaults:
///
/// ```toml
/// image-prefix = "imgTemplate"
/// emu-per-pixel = 9525
/// scalar-match-case = false
/// delete-consumed-images = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReportOptions {
    /// Bookmark and hyperlink text prefix marking an image anchor.
    pub image_prefix: String,
    /// Drawing size units per image pixel (9525 at 96 DPI).
    pub emu_per_pixel: i64,
    /// Whether `[Name]` tokens are matched case-sensitively.
    pub scalar_match_case: bool,
    /// Delete image source files once they are embedded.
    pub delete_consumed_images: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            image_prefix: "imgTemplate".to_string(),
            emu_per_pixel: 9525,
            scalar_match_case: false,
            delete_consumed_images: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serializes_with_kebab_case_keys() {
        let json = serde_json::to_value(ReportOptions::default()).unwrap();
        assert_eq!(json["image-prefix"], "imgTemplate");
        assert_eq!(json["emu-per-pixel"], 9525);
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let options: ReportOptions =
            serde_json::from_str(r#"{"delete-consumed-images": false}"#).unwrap();
        assert_eq!(
            options,
            ReportOptions {
                delete_consumed_images: false,
                ..ReportOptions::default()
            }
        );
    }
}
