//! Video stream parameters and format negotiation

use serde::{Deserialize, Serialize};

/// Requested or negotiated stream parameters
///
/// A source is opened with a requested config and reports back the config it
/// actually granted. The granted config is what the registry publishes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Physical path (device node or remote URL)
    pub path: String,
    /// Driver identifier (e.g. "uvcvideo", "remote")
    pub driver: String,
    /// FourCC codec tag (e.g. "MJPG")
    pub codec: String,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frames per second
    pub fps: u32,
}

impl VideoConfig {
    /// Create a config for the given codec, size and frame rate
    pub fn new(codec: impl Into<String>, width: u32, height: u32, fps: u32) -> Self {
        Self {
            codec: codec.into(),
            width,
            height,
            fps,
            ..Default::default()
        }
    }

    /// MJPEG 1920x1080 at 30fps, the default request for local cameras
    pub fn mjpeg_1080p() -> Self {
        Self::new("MJPG", 1920, 1080, 30)
    }

    /// Set the physical path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the driver identifier
    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }

    /// Distance between two configs; lower is closer
    ///
    /// A codec mismatch costs 100, every other field costs its absolute
    /// difference.
    pub fn score(&self, other: &VideoConfig) -> u64 {
        let mut score = 0;
        if !self.codec.eq_ignore_ascii_case(&other.codec) {
            score += 100;
        }
        score += u64::from(self.width.abs_diff(other.width));
        score += u64::from(self.height.abs_diff(other.height));
        score += u64::from(self.fps.abs_diff(other.fps));
        score
    }

    /// Pick the candidate closest to this request (first one wins ties)
    pub fn best_match<'a>(&self, candidates: &'a [VideoConfig]) -> Option<&'a VideoConfig> {
        let mut best: Option<(&VideoConfig, u64)> = None;
        for candidate in candidates {
            let score = self.score(candidate);
            match best {
                Some((_, lowest)) if score >= lowest => {}
                _ => best = Some((candidate, score)),
            }
        }
        best.map(|(config, _)| config)
    }
}

impl std::fmt::Display for VideoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}x{}@{}",
            self.codec, self.width, self.height, self.fps
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_exact() {
        let a = VideoConfig::mjpeg_1080p();
        assert_eq!(a.score(&a.clone()), 0);
    }

    #[test]
    fn test_score_codec_mismatch() {
        let a = VideoConfig::mjpeg_1080p();
        let b = VideoConfig::new("YUYV", 1920, 1080, 30);
        assert_eq!(a.score(&b), 100);
    }

    #[test]
    fn test_best_match() {
        let wanted = VideoConfig::mjpeg_1080p();
        let offered = vec![
            VideoConfig::new("YUYV", 1920, 1080, 30),
            VideoConfig::new("MJPG", 1280, 720, 30),
            VideoConfig::new("MJPG", 1920, 1080, 15),
            VideoConfig::new("MJPG", 1920, 1080, 5),
        ];

        let best = wanted.best_match(&offered).unwrap();
        assert_eq!(best, &offered[2]);
    }

    #[test]
    fn test_best_match_tie_keeps_first() {
        let wanted = VideoConfig::new("MJPG", 640, 480, 30);
        let offered = vec![
            VideoConfig::new("MJPG", 640, 480, 25),
            VideoConfig::new("MJPG", 640, 480, 35),
        ];
        assert_eq!(wanted.best_match(&offered), Some(&offered[0]));
        assert_eq!(wanted.best_match(&[]), None);
    }

    #[test]
    fn test_serde_field_names() {
        let config = VideoConfig::mjpeg_1080p()
            .with_path("/dev/video0")
            .with_driver("uvcvideo");
        let value = serde_json::to_value(&config).unwrap();

        assert_eq!(value["path"], "/dev/video0");
        assert_eq!(value["codec"], "MJPG");
        assert_eq!(value["width"], 1920);
        assert_eq!(value["fps"], 30);
    }
}
