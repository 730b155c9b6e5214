//! Clip requests and batch results.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Target aspect ratio for a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    /// 9:16 vertical (shorts/reels).
    #[default]
    Portrait,
    /// 16:9 horizontal.
    Landscape,
    /// 1:1 square.
    Square,
    /// Any other W:H ratio, scaled proportionally.
    Custom(u32, u32),
}

impl AspectRatio {
    /// Width/height parts of the ratio.
    pub fn parts(&self) -> (u32, u32) {
        match self {
            AspectRatio::Portrait => (9, 16),
            AspectRatio::Landscape => (16, 9),
            AspectRatio::Square => (1, 1),
            AspectRatio::Custom(w, h) => (*w, *h),
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.parts();
        write!(f, "{}:{}", w, h)
    }
}

impl FromStr for AspectRatio {
    type Err = AspectRatioParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| AspectRatioParseError(s.to_string()))?;
        let w: u32 = w.parse().map_err(|_| AspectRatioParseError(s.to_string()))?;
        let h: u32 = h.parse().map_err(|_| AspectRatioParseError(s.to_string()))?;
        if w == 0 || h == 0 {
            return Err(AspectRatioParseError(s.to_string()));
        }
        Ok(match (w, h) {
            (9, 16) => AspectRatio::Portrait,
            (16, 9) => AspectRatio::Landscape,
            (1, 1) => AspectRatio::Square,
            (w, h) => AspectRatio::Custom(w, h),
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid aspect ratio: {0}")]
pub struct AspectRatioParseError(String);

/// One requested clip out of a source video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClipRequest {
    /// Start offset into the source, seconds.
    pub start_time: f64,
    /// End offset, seconds. Must be strictly greater than `start_time`.
    pub end_time: f64,
    pub title: String,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
}

impl ClipRequest {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// A request is well-formed when its time range is positive.
    pub fn validate(&self) -> Result<(), String> {
        if !self.start_time.is_finite() || !self.end_time.is_finite() {
            return Err("Clip times must be finite".to_string());
        }
        if self.start_time < 0.0 {
            return Err(format!("Negative start time: {}", self.start_time));
        }
        if self.end_time <= self.start_time {
            return Err(format!(
                "End time {} must be greater than start time {}",
                self.end_time, self.start_time
            ));
        }
        Ok(())
    }
}

/// Outcome status of a single clip job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClipStatus {
    Completed,
    Failed,
}

/// Per-clip result; every request produces exactly one.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClipOutcome {
    pub id: String,
    pub title: String,
    pub output_path: String,
    pub status: ClipStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClipOutcome {
    pub fn completed(id: impl Into<String>, title: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            output_path: output.into(),
            status: ClipStatus::Completed,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, title: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            output_path: String::new(),
            status: ClipStatus::Failed,
            error: Some(error.into()),
        }
    }
}

/// Aggregated result of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchResult {
    /// True iff every clip completed.
    pub success: bool,
    pub clips: Vec<ClipOutcome>,
}

impl BatchResult {
    pub fn from_outcomes(clips: Vec<ClipOutcome>) -> Self {
        let success = clips.iter().all(|c| c.status == ClipStatus::Completed);
        Self { success, clips }
    }

    pub fn failed_count(&self) -> usize {
        self.clips
            .iter()
            .filter(|c| c.status == ClipStatus::Failed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_parsing() {
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::Portrait);
        assert_eq!("16:9".parse::<AspectRatio>().unwrap(), AspectRatio::Landscape);
        assert_eq!("1:1".parse::<AspectRatio>().unwrap(), AspectRatio::Square);
        assert_eq!("4:3".parse::<AspectRatio>().unwrap(), AspectRatio::Custom(4, 3));
        assert!("wide".parse::<AspectRatio>().is_err());
        assert!("0:9".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_request_validation() {
        let ok = ClipRequest {
            start_time: 5.0,
            end_time: 12.5,
            title: "Intro".to_string(),
            aspect_ratio: AspectRatio::Portrait,
        };
        assert!(ok.validate().is_ok());
        assert!((ok.duration() - 7.5).abs() < f64::EPSILON);

        let zero = ClipRequest {
            start_time: 5.0,
            end_time: 5.0,
            title: "Zero".to_string(),
            aspect_ratio: AspectRatio::Portrait,
        };
        assert!(zero.validate().is_err());

        let negative = ClipRequest {
            start_time: -1.0,
            end_time: 5.0,
            title: "Neg".to_string(),
            aspect_ratio: AspectRatio::Portrait,
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_batch_result_success_flag() {
        let all_ok = BatchResult::from_outcomes(vec![
            ClipOutcome::completed("a", "A", "/out/a.mp4"),
            ClipOutcome::completed("b", "B", "/out/b.mp4"),
        ]);
        assert!(all_ok.success);
        assert_eq!(all_ok.failed_count(), 0);

        let mixed = BatchResult::from_outcomes(vec![
            ClipOutcome::completed("a", "A", "/out/a.mp4"),
            ClipOutcome::failed("b", "B", "boom"),
        ]);
        assert!(!mixed.success);
        assert_eq!(mixed.failed_count(), 1);
    }
}
