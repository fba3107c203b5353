//! Monitor geometry and the image <-> screen coordinate system.
//!
//! Captured frames live in image coordinates with origin at the top-left of
//! the capture region; the OS reports window rectangles and expects click
//! positions in screen coordinates. [`ScreenMapper`] owns the capture region
//! and converts between the two. Monitors placed left of (or above) the
//! primary display have negative screen coordinates, so the capture region
//! origin can itself be negative.

use crate::error::{Error, Result};

/// One physical display in screen coordinates. Immutable once enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Monitor {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

impl Monitor {
    /// Build a monitor record. Zero-sized displays are rejected.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::Config(format!(
                "monitor at ({x}, {y}) has zero extent ({width}x{height})"
            )));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Screen x of the right edge (exclusive).
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    /// Screen y of the bottom edge (exclusive).
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    /// Whether this display sits left of the primary (negative x).
    pub fn is_left_of_primary(&self) -> bool {
        self.x < 0
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// The rectangle of screen pixels grabbed each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

/// An axis-aligned box with `x2 > x1` and `y2 > y1`, enforced at
/// construction. Used both for window rectangles (screen coordinates) and
/// search areas (image coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Self> {
        if x2 <= x1 || y2 <= y1 {
            return Err(Error::Config(format!(
                "degenerate bounding box ({x1}, {y1}) -> ({x2}, {y2})"
            )));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    pub fn x1(&self) -> i32 {
        self.x1
    }

    pub fn y1(&self) -> i32 {
        self.y1
    }

    pub fn x2(&self) -> i32 {
        self.x2
    }

    pub fn y2(&self) -> i32 {
        self.y2
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1) as u32
    }

    /// Shrink the box symmetrically: each edge moves inward by
    /// `factor * extent` on its axis. Fails if the result collapses
    /// (factor >= 0.5 on either axis).
    pub fn pad(&self, factor: f64) -> Result<Self> {
        let w_pad = (self.width() as f64 * factor) as i32;
        let h_pad = (self.height() as f64 * factor) as i32;
        Self::new(
            self.x1 + w_pad,
            self.y1 + h_pad,
            self.x2 - w_pad,
            self.y2 - h_pad,
        )
    }
}

/// Establishes the capture region from the monitor layout and converts
/// between image and screen coordinates.
pub struct ScreenMapper {
    monitors: Vec<Monitor>,
    region: Region,
}

impl ScreenMapper {
    /// Build a mapper over an ordered monitor list (primary first).
    ///
    /// With `force_primary`, or when only one display exists, the capture
    /// region is the primary monitor's own bounds. Otherwise it is the
    /// union bounding box of every display.
    pub fn new(monitors: Vec<Monitor>, force_primary: bool) -> Result<Self> {
        let Some(primary) = monitors.first().copied() else {
            return Err(Error::Config("no monitors enumerated".into()));
        };

        let region = if force_primary || monitors.len() == 1 {
            Region {
                left: primary.x(),
                top: primary.y(),
                width: primary.width(),
                height: primary.height(),
            }
        } else {
            let left = monitors.iter().map(Monitor::x).min().unwrap();
            let top = monitors.iter().map(Monitor::y).min().unwrap();
            let right = monitors.iter().map(Monitor::right).max().unwrap();
            let bottom = monitors.iter().map(Monitor::bottom).max().unwrap();
            Region {
                left,
                top,
                width: (right - left) as u32,
                height: (bottom - top) as u32,
            }
        };

        log::info!(
            "capture region {}x{} at ({}, {}) across {} monitor(s)",
            region.width,
            region.height,
            region.left,
            region.top,
            monitors.len()
        );

        Ok(Self { monitors, region })
    }

    pub fn monitors(&self) -> &[Monitor] {
        &self.monitors
    }

    pub fn capture_region(&self) -> Region {
        self.region
    }

    /// Image coordinates -> absolute screen coordinates.
    pub fn image_to_monitor(&self, x: i32, y: i32) -> (i32, i32) {
        (x + self.region.left, y + self.region.top)
    }

    /// Absolute screen coordinates -> image coordinates. Exact inverse of
    /// [`Self::image_to_monitor`].
    pub fn monitor_to_image(&self, x: i32, y: i32) -> (i32, i32) {
        (x - self.region.left, y - self.region.top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_rejects_zero_extent() {
        assert!(Monitor::new(0, 0, 0, 1080).is_err());
        assert!(Monitor::new(0, 0, 1920, 0).is_err());
    }

    #[test]
    fn bounding_box_rejects_collapsed_edges() {
        assert!(BoundingBox::new(10, 10, 10, 20).is_err());
        assert!(BoundingBox::new(10, 10, 20, 10).is_err());
        assert!(BoundingBox::new(10, 10, 5, 20).is_err());
        assert!(BoundingBox::new(10, 10, 20, 20).is_ok());
    }

    #[test]
    fn pad_moves_edges_inward() {
        let bbox = BoundingBox::new(0, 0, 100, 50).unwrap();
        let padded = bbox.pad(0.1).unwrap();
        assert_eq!(
            (padded.x1(), padded.y1(), padded.x2(), padded.y2()),
            (10, 5, 90, 45)
        );
    }

    #[test]
    fn pad_fails_when_box_collapses() {
        let bbox = BoundingBox::new(0, 0, 100, 50).unwrap();
        assert!(bbox.pad(0.5).is_err());
    }
}
