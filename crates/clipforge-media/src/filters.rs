//! FFmpeg video filter policy for clip aspect ratios.

use clipforge_models::AspectRatio;

/// 9:16 portrait: center-crop a vertical slice out of the frame.
pub const FILTER_PORTRAIT: &str = "crop=ih*9/16:ih:(iw-ih*9/16)/2:0";

/// 16:9 landscape: fixed-resolution scale.
pub const FILTER_LANDSCAPE: &str = "scale=1280:720";

/// 1:1 square: center-crop the largest square.
pub const FILTER_SQUARE: &str =
    "crop=min(iw\\,ih):min(iw\\,ih):(iw-min(iw\\,ih))/2:(ih-min(iw\\,ih))/2";

/// Build the video filter for a requested aspect ratio.
///
/// Ratios outside the policy table fall back to a proportional scale.
pub fn filter_for_aspect(aspect: AspectRatio) -> String {
    match aspect {
        AspectRatio::Portrait => FILTER_PORTRAIT.to_string(),
        AspectRatio::Landscape => FILTER_LANDSCAPE.to_string(),
        AspectRatio::Square => FILTER_SQUARE.to_string(),
        AspectRatio::Custom(w, h) => format!("scale={}:{}", w * 80, h * 80),
    }
}

/// Build filter for thumbnail generation.
pub fn filter_thumbnail(width: u32) -> String {
    format!("scale={}:-2", width)
}
