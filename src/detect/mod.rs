//! Button detection: template registry plus the feature-matching detector.
//!
//! [`ButtonDetector::detect`] is a pure function of its inputs: it holds no
//! per-tick state and produces a fresh [`DetectionResult`] on every hit.

pub mod features;
mod registry;

use std::fmt;

use image::RgbImage;
use image::imageops;

use crate::detect::features::FeatureSet;
use crate::geometry::BoundingBox;

pub use registry::{TemplateCandidate, TemplateRegistry};

/// The logical buttons this scanner knows how to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonKind {
    /// Download button inside the Vortex mod manager.
    Vortex,
    /// Download button on the mod website.
    Website,
    /// Download button inside Wabbajack.
    Wabbajack,
    /// "Click here" confirmation dialog.
    Click,
    /// "Understood" popup dialog.
    Understood,
    /// "Staging folder" popup dialog.
    Staging,
}

impl ButtonKind {
    pub const ALL: [ButtonKind; 6] = [
        ButtonKind::Vortex,
        ButtonKind::Website,
        ButtonKind::Wabbajack,
        ButtonKind::Click,
        ButtonKind::Understood,
        ButtonKind::Staging,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ButtonKind::Vortex => "vortex",
            ButtonKind::Website => "website",
            ButtonKind::Wabbajack => "wabbajack",
            ButtonKind::Click => "click",
            ButtonKind::Understood => "understood",
            ButtonKind::Staging => "staging",
        }
    }
}

impl fmt::Display for ButtonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A located button in frame (image) coordinates. Transient and immutable.
#[derive(Debug, Clone, Copy)]
pub struct DetectionResult {
    pub kind: ButtonKind,
    pub x: i32,
    pub y: i32,
    /// `min(num_matches / (2 * min_matches), 1.0)`.
    pub confidence: f32,
    pub num_matches: usize,
    pub template_width: u32,
    pub template_height: u32,
}

/// Feature-matching detector over a loaded [`TemplateRegistry`].
pub struct ButtonDetector {
    registry: TemplateRegistry,
}

impl ButtonDetector {
    pub fn new(registry: TemplateRegistry) -> Self {
        Self { registry }
    }

    /// Locate `kind` in `frame`, optionally restricted to `bbox` (image
    /// coordinates, clipped to the frame).
    ///
    /// Soft misses all return `None`: a search box degenerate after
    /// clipping, a region without keypoints, no template variant for the
    /// active mode, or every variant falling below `min_matches`.
    pub fn detect(
        &self,
        frame: &RgbImage,
        kind: ButtonKind,
        min_matches: usize,
        ratio: f32,
        bbox: Option<BoundingBox>,
    ) -> Option<DetectionResult> {
        let candidates = self.registry.candidates(kind);
        if candidates.is_empty() {
            return None;
        }

        let (gray, offset_x, offset_y) = match bbox {
            Some(bbox) => {
                let x1 = bbox.x1().max(0);
                let y1 = bbox.y1().max(0);
                let x2 = bbox.x2().min(frame.width() as i32);
                let y2 = bbox.y2().min(frame.height() as i32);
                if x2 <= x1 || y2 <= y1 {
                    log::debug!("{kind}: search box degenerate after clipping");
                    return None;
                }
                let crop = imageops::crop_imm(
                    frame,
                    x1 as u32,
                    y1 as u32,
                    (x2 - x1) as u32,
                    (y2 - y1) as u32,
                );
                (imageops::grayscale(&crop), x1, y1)
            }
            None => (imageops::grayscale(frame), 0, 0),
        };

        let scene = features::extract(&gray);
        if scene.is_empty() {
            log::debug!("{kind}: no keypoints in search region");
            return None;
        }

        let best = self.best_candidate(candidates, &scene, min_matches, ratio)?;
        let (candidate, scored) = best;

        let x = (scored.x + offset_x as f32) as i32;
        let y = (scored.y + offset_y as f32) as i32;
        let confidence = confidence(scored.num_matches, min_matches);

        log::info!(
            "detected {kind} at ({x}, {y}) with {} matches (confidence {confidence:.2})",
            scored.num_matches
        );

        Some(DetectionResult {
            kind,
            x,
            y,
            confidence,
            num_matches: scored.num_matches,
            template_width: candidate.width,
            template_height: candidate.height,
        })
    }

    /// Run [`Self::detect`] independently for each kind, collecting the
    /// hits. Kinds are not mutually exclusive; one frame can contain
    /// several buttons.
    pub fn detect_multiple(
        &self,
        frame: &RgbImage,
        kinds: &[ButtonKind],
        min_matches: usize,
        ratio: f32,
    ) -> Vec<DetectionResult> {
        kinds
            .iter()
            .filter_map(|&kind| self.detect(frame, kind, min_matches, ratio, None))
            .collect()
    }

    /// Highest good-match count wins; ties keep the earlier-registered
    /// candidate, so iteration order is deterministic.
    fn best_candidate<'a>(
        &self,
        candidates: &'a [TemplateCandidate],
        scene: &FeatureSet,
        min_matches: usize,
        ratio: f32,
    ) -> Option<(&'a TemplateCandidate, features::ScoredMatch)> {
        let mut best: Option<(&TemplateCandidate, features::ScoredMatch)> = None;
        for candidate in candidates {
            let Some(scored) =
                features::score_template(&candidate.descriptors, scene, min_matches, ratio)
            else {
                continue;
            };
            let better = best
                .as_ref()
                .is_none_or(|(_, current)| scored.num_matches > current.num_matches);
            if better {
                best = Some((candidate, scored));
            }
        }
        best
    }
}

/// Detection confidence: grows linearly with the good-match count and
/// saturates at 1.0 once it reaches twice the gate.
pub fn confidence(num_matches: usize, min_matches: usize) -> f32 {
    (num_matches as f32 / (2 * min_matches) as f32).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(ButtonKind::Vortex.label(), "vortex");
        assert_eq!(ButtonKind::Website.to_string(), "website");
        assert_eq!(ButtonKind::ALL.len(), 6);
    }

    #[test]
    fn confidence_is_monotonic_and_saturates() {
        let min_matches = 8;
        let mut previous = 0.0f32;
        for n in 0..40 {
            let c = confidence(n, min_matches);
            assert!(c >= previous, "confidence dropped at {n} matches");
            previous = c;
        }
        assert_eq!(confidence(8, 8), 0.5);
        assert_eq!(confidence(16, 8), 1.0);
        assert_eq!(confidence(17, 8), 1.0);
        assert!(confidence(15, 8) < 1.0);
    }
}
