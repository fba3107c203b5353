//! Annotated detection frames for offline troubleshooting.
//!
//! Purely observational: recording failures are logged and swallowed, never
//! surfaced to the scan loop.

use std::fs;
use std::path::PathBuf;

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::detect::DetectionResult;
use crate::error::{Error, Result};

const MARKER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Half-length of the center cross.
const CROSS_ARM: f32 = 8.0;

/// Writes annotated detection frames when an output directory is set.
pub struct DebugRecorder {
    output_dir: Option<PathBuf>,
}

impl DebugRecorder {
    /// Disabled when `output_dir` is `None`; otherwise the directory is
    /// created up front.
    pub fn new(output_dir: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = &output_dir {
            fs::create_dir_all(dir).map_err(|e| {
                Error::Config(format!("cannot create debug dir {}: {e}", dir.display()))
            })?;
            log::info!("debug frames will be saved to {}", dir.display());
        }
        Ok(Self { output_dir })
    }

    /// Save `frame` with the detection outlined, if recording is enabled.
    pub fn record(&self, frame: &RgbImage, detection: &DetectionResult, iteration: u64, label: &str) {
        let Some(dir) = &self.output_dir else {
            return;
        };

        let mut annotated = frame.clone();
        draw_detection(&mut annotated, detection);

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
        let path = dir.join(format!("frame_{iteration:06}_{label}_{timestamp}.png"));
        match annotated.save(&path) {
            Ok(()) => log::debug!("wrote debug frame {}", path.display()),
            Err(e) => log::warn!("failed to write debug frame {}: {e}", path.display()),
        }
    }
}

/// Hollow template-sized box around the click point plus a center cross.
fn draw_detection(image: &mut RgbImage, detection: &DetectionResult) {
    let (img_w, img_h) = (image.width() as i32, image.height() as i32);
    let half_w = detection.template_width as i32 / 2;
    let half_h = detection.template_height as i32 / 2;

    let x1 = (detection.x - half_w).max(0);
    let y1 = (detection.y - half_h).max(0);
    let x2 = (detection.x + half_w).min(img_w - 1);
    let y2 = (detection.y + half_h).min(img_h - 1);

    if x2 > x1 && y2 > y1 {
        let rect = Rect::at(x1, y1).of_size((x2 - x1) as u32, (y2 - y1) as u32);
        draw_hollow_rect_mut(image, rect, MARKER_COLOR);
    }

    let (cx, cy) = (detection.x as f32, detection.y as f32);
    draw_line_segment_mut(image, (cx - CROSS_ARM, cy), (cx + CROSS_ARM, cy), MARKER_COLOR);
    draw_line_segment_mut(image, (cx, cy - CROSS_ARM), (cx, cy + CROSS_ARM), MARKER_COLOR);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ButtonKind;

    #[test]
    fn disabled_recorder_is_a_no_op() {
        let recorder = DebugRecorder::new(None).unwrap();
        let frame = RgbImage::new(32, 32);
        let detection = DetectionResult {
            kind: ButtonKind::Website,
            x: 16,
            y: 16,
            confidence: 1.0,
            num_matches: 12,
            template_width: 10,
            template_height: 10,
        };
        recorder.record(&frame, &detection, 1, "web_website");
    }

    #[test]
    fn enabled_recorder_writes_annotated_frames() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = DebugRecorder::new(Some(dir.path().to_path_buf())).unwrap();
        let frame = RgbImage::new(64, 64);
        let detection = DetectionResult {
            kind: ButtonKind::Vortex,
            x: 32,
            y: 32,
            confidence: 0.5,
            num_matches: 8,
            template_width: 20,
            template_height: 12,
        };
        recorder.record(&frame, &detection, 3, "vortex_download");

        let written: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(written.len(), 1);
        let name = written[0].as_ref().unwrap().file_name();
        assert!(name.to_string_lossy().starts_with("frame_000003_vortex_download"));
    }
}
