//! Keypoint extraction and binary descriptor matching.
//!
//! Keypoints are FAST-9 corners; descriptors are 256 brightness-comparison
//! bits sampled from a smoothed patch around each corner, with one fixed
//! test-pair pattern shared by template and frame extraction. Matching is
//! brute-force 2-nearest-neighbor over Hamming distance with Lowe's ratio
//! test, so a match only counts when it is distinctly closer than its
//! runner-up.

use std::sync::OnceLock;

use image::GrayImage;
use imageproc::corners::corners_fast9;
use imageproc::filter::gaussian_blur_f32;
use rayon::prelude::*;

/// Descriptor length in bits.
pub const DESCRIPTOR_BITS: usize = 256;
const DESCRIPTOR_WORDS: usize = DESCRIPTOR_BITS / 64;

/// Side of the square patch sampled around each keypoint.
pub const PATCH_SIZE: u32 = 31;
const PATCH_RADIUS: i32 = (PATCH_SIZE / 2) as i32;
/// Test-pair offsets stay inside the patch with this margin, so blur
/// artifacts at the patch border never enter a descriptor.
const SAMPLE_RADIUS: i32 = PATCH_RADIUS - 2;

/// FAST-9 corner threshold on 8-bit intensity.
const FAST_THRESHOLD: u8 = 20;
/// Smoothing applied before sampling comparison bits.
const SMOOTHING_SIGMA: f32 = 1.4;

/// A 256-bit binary descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor(pub [u64; DESCRIPTOR_WORDS]);

impl Descriptor {
    /// Number of differing bits.
    pub fn hamming(&self, other: &Descriptor) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

/// A described keypoint in the coordinates of the image it came from.
#[derive(Debug, Clone, Copy)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
}

/// Keypoints plus their descriptors, index-aligned.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    pub keypoints: Vec<KeyPoint>,
    pub descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }
}

/// One comparison: sample at (x1, y1), compare against (x2, y2).
type TestPair = (i32, i32, i32, i32);

/// The fixed comparison pattern. Generated once from a deterministic
/// xorshift sequence so template descriptors computed at load time stay
/// comparable with frame descriptors computed per tick.
fn test_pairs() -> &'static [TestPair; DESCRIPTOR_BITS] {
    static PAIRS: OnceLock<[TestPair; DESCRIPTOR_BITS]> = OnceLock::new();
    PAIRS.get_or_init(|| {
        let mut state: u32 = 0x9E37_79B9;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };
        let span = (2 * SAMPLE_RADIUS + 1) as u32;
        let mut offset = || (next() % span) as i32 - SAMPLE_RADIUS;
        let mut pairs = [(0, 0, 0, 0); DESCRIPTOR_BITS];
        for pair in pairs.iter_mut() {
            *pair = (offset(), offset(), offset(), offset());
        }
        pairs
    })
}

/// Extract keypoints and descriptors from a grayscale image.
///
/// Corners too close to the border for a full patch are dropped; an image
/// with no usable corners yields an empty set.
pub fn extract(gray: &GrayImage) -> FeatureSet {
    let (width, height) = gray.dimensions();
    if width < PATCH_SIZE || height < PATCH_SIZE {
        return FeatureSet::default();
    }

    let corners = corners_fast9(gray, FAST_THRESHOLD);
    if corners.is_empty() {
        return FeatureSet::default();
    }

    let smoothed = gaussian_blur_f32(gray, SMOOTHING_SIGMA);
    let pairs = test_pairs();

    let mut features = FeatureSet::default();
    for corner in &corners {
        let cx = corner.x as i32;
        let cy = corner.y as i32;
        if cx < PATCH_RADIUS
            || cy < PATCH_RADIUS
            || cx + PATCH_RADIUS >= width as i32
            || cy + PATCH_RADIUS >= height as i32
        {
            continue;
        }

        let mut words = [0u64; DESCRIPTOR_WORDS];
        for (bit, &(x1, y1, x2, y2)) in pairs.iter().enumerate() {
            let a = smoothed.get_pixel((cx + x1) as u32, (cy + y1) as u32)[0];
            let b = smoothed.get_pixel((cx + x2) as u32, (cy + y2) as u32)[0];
            if a < b {
                words[bit / 64] |= 1u64 << (bit % 64);
            }
        }

        features.keypoints.push(KeyPoint {
            x: corner.x as f32,
            y: corner.y as f32,
        });
        features.descriptors.push(Descriptor(words));
    }

    features
}

/// One template descriptor accepted by the ratio test, pointing at the
/// frame keypoint it matched.
#[derive(Debug, Clone, Copy)]
pub struct GoodMatch {
    /// Index into the frame feature set.
    pub frame_index: usize,
    pub distance: u32,
}

/// 2-NN Hamming matching of template descriptors against frame
/// descriptors, keeping only matches that pass the ratio test
/// `d1 < ratio * d2`. Needs at least two frame descriptors; with fewer
/// there is no runner-up to test against and nothing is accepted.
pub fn ratio_matches(template: &[Descriptor], frame: &[Descriptor], ratio: f32) -> Vec<GoodMatch> {
    if frame.len() < 2 {
        return Vec::new();
    }

    template
        .par_iter()
        .filter_map(|desc| {
            let mut best = u32::MAX;
            let mut second = u32::MAX;
            let mut best_index = 0usize;
            for (index, candidate) in frame.iter().enumerate() {
                let d = desc.hamming(candidate);
                if d < best {
                    second = best;
                    best = d;
                    best_index = index;
                } else if d < second {
                    second = d;
                }
            }
            if (best as f32) < ratio * second as f32 {
                Some(GoodMatch {
                    frame_index: best_index,
                    distance: best,
                })
            } else {
                None
            }
        })
        .collect()
}

/// A template scored against a frame: the good-match centroid in frame
/// coordinates and the good-match count.
#[derive(Debug, Clone, Copy)]
pub struct ScoredMatch {
    pub x: f32,
    pub y: f32,
    pub num_matches: usize,
}

/// Run the ratio test for one template descriptor set and reduce the
/// surviving matches to a centroid. Returns `None` below `min_matches`.
pub fn score_template(
    template: &[Descriptor],
    frame: &FeatureSet,
    min_matches: usize,
    ratio: f32,
) -> Option<ScoredMatch> {
    let good = ratio_matches(template, &frame.descriptors, ratio);
    if good.len() < min_matches {
        return None;
    }

    let (sum_x, sum_y) = good.iter().fold((0.0f32, 0.0f32), |(sx, sy), m| {
        let kp = frame.keypoints[m.frame_index];
        (sx + kp.x, sy + kp.y)
    });
    let n = good.len() as f32;
    Some(ScoredMatch {
        x: sum_x / n,
        y: sum_y / n,
        num_matches: good.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Descriptor with the `ones` lowest bits set.
    fn desc_with_ones(ones: u32) -> Descriptor {
        let mut words = [0u64; DESCRIPTOR_WORDS];
        for bit in 0..ones as usize {
            words[bit / 64] |= 1u64 << (bit % 64);
        }
        Descriptor(words)
    }

    #[test]
    fn hamming_counts_differing_bits() {
        let zero = desc_with_ones(0);
        assert_eq!(zero.hamming(&zero), 0);
        assert_eq!(zero.hamming(&desc_with_ones(5)), 5);
        assert_eq!(desc_with_ones(3).hamming(&desc_with_ones(5)), 2);
    }

    #[test]
    fn test_pair_pattern_is_stable_and_in_range() {
        let pairs = test_pairs();
        assert_eq!(pairs.len(), DESCRIPTOR_BITS);
        for &(x1, y1, x2, y2) in pairs.iter() {
            for v in [x1, y1, x2, y2] {
                assert!(v.abs() <= SAMPLE_RADIUS);
            }
        }
        // Same static pattern on repeated access.
        assert_eq!(pairs[0], test_pairs()[0]);
    }

    #[test]
    fn ratio_test_rejects_ambiguous_matches() {
        // A probe equidistant from both frame descriptors has no
        // distinctly-closer nearest neighbour: 1 < 0.75 * 1 fails.
        let frame = vec![desc_with_ones(10), desc_with_ones(12)];
        let probe = vec![desc_with_ones(11)];
        assert!(ratio_matches(&probe, &frame, 0.75).is_empty());

        // An exact copy of frame[0] is unambiguous: 0 < 0.75 * 2.
        let exact = vec![desc_with_ones(10)];
        let good = ratio_matches(&exact, &frame, 0.75);
        assert_eq!(good.len(), 1);
        assert_eq!(good[0].frame_index, 0);
    }

    #[test]
    fn loosening_the_ratio_never_drops_matches() {
        let frame: Vec<Descriptor> = (0..16).map(|i| desc_with_ones(i * 8)).collect();
        let template: Vec<Descriptor> = (0..16).map(|i| desc_with_ones(i * 8 + 3)).collect();
        let mut previous = 0;
        for ratio in [0.2, 0.4, 0.6, 0.8, 1.0] {
            let count = ratio_matches(&template, &frame, ratio).len();
            assert!(count >= previous, "count dropped at ratio {ratio}");
            previous = count;
        }
    }

    #[test]
    fn too_few_frame_descriptors_yield_nothing() {
        let template = vec![desc_with_ones(4)];
        assert!(ratio_matches(&template, &[desc_with_ones(4)], 0.9).is_empty());
        assert!(ratio_matches(&template, &[], 0.9).is_empty());
    }

    /// Build a frame set where exactly `hits` template descriptors have an
    /// unambiguous nearest neighbour, placed so the matched keypoints
    /// average to `centroid`.
    fn synthetic_scene(hits: usize, centroid: (f32, f32)) -> (Vec<Descriptor>, FeatureSet) {
        let mut frame = FeatureSet::default();
        let mut template = Vec::new();

        // Matched pairs: identical descriptors, far from everything else.
        for i in 0..hits {
            let desc = desc_with_ones((i as u32 + 1) * 24);
            template.push(desc);
            frame.descriptors.push(desc);
            // Spread keypoints symmetrically around the centroid.
            let offset = (i as f32 - (hits as f32 - 1.0) / 2.0) * 10.0;
            frame.keypoints.push(KeyPoint {
                x: centroid.0 + offset,
                y: centroid.1 - offset,
            });
        }

        // One ambiguous template descriptor: its two nearest frame entries
        // are 3 and 4 bits away, and 3 < 0.75 * 4 does not hold.
        let near_a = desc_with_ones(250);
        let mut near_b = near_a;
        near_b.0[0] ^= 1;
        frame.descriptors.push(near_a);
        frame.keypoints.push(KeyPoint { x: 0.0, y: 0.0 });
        frame.descriptors.push(near_b);
        frame.keypoints.push(KeyPoint { x: 0.0, y: 0.0 });
        let mut ambiguous = near_a;
        ambiguous.0[1] ^= 0b111;
        template.push(ambiguous);

        (template, frame)
    }

    #[test]
    fn eight_good_matches_score_at_the_centroid() {
        let (template, frame) = synthetic_scene(8, (400.0, 300.0));
        let scored = score_template(&template, &frame, 8, 0.75).unwrap();
        assert_eq!(scored.num_matches, 8);
        assert!((scored.x - 400.0).abs() < 1e-3);
        assert!((scored.y - 300.0).abs() < 1e-3);
    }

    #[test]
    fn seven_good_matches_fall_below_the_gate() {
        let (template, frame) = synthetic_scene(7, (400.0, 300.0));
        assert!(score_template(&template, &frame, 8, 0.75).is_none());
    }

    #[test]
    fn extraction_on_flat_image_is_empty() {
        let gray = GrayImage::from_pixel(64, 64, image::Luma([128u8]));
        assert!(extract(&gray).is_empty());
    }
}
