//! Simulated desktop for tests and non-desktop hosts.
//!
//! Frames are queued ahead of time; the last one repeats once the queue
//! drains, and an empty queue yields black frames. Clicks are recorded
//! instead of injected.

use std::collections::VecDeque;
use std::time::Duration;

use image::{RgbImage, imageops};

use crate::backend::DesktopEnv;
use crate::error::Result;
use crate::geometry::{BoundingBox, Monitor, Region};

/// The standard simulated layout: two 1920x1080 displays side by side.
pub fn sim_monitors() -> Vec<Monitor> {
    vec![
        Monitor::new(0, 0, 1920, 1080).unwrap(),
        Monitor::new(1920, 0, 1920, 1080).unwrap(),
    ]
}

/// Scripted backend: deterministic frames, recorded clicks.
pub struct SimBackend {
    monitors: Vec<Monitor>,
    frames: VecDeque<RgbImage>,
    last_frame: Option<RgbImage>,
    window: Option<BoundingBox>,
    clicks: Vec<(i32, i32)>,
}

impl SimBackend {
    pub fn new(monitors: Vec<Monitor>) -> Self {
        Self {
            monitors,
            frames: VecDeque::new(),
            last_frame: None,
            window: None,
            clicks: Vec::new(),
        }
    }

    /// Queue a frame to be served by the next capture.
    pub fn push_frame(&mut self, frame: RgbImage) {
        self.frames.push_back(frame);
    }

    /// Rectangle reported for any window lookup; `None` simulates a
    /// missing window.
    pub fn set_window(&mut self, window: Option<BoundingBox>) {
        self.window = window;
    }

    /// Clicks dispatched so far, in screen coordinates.
    pub fn clicks(&self) -> &[(i32, i32)] {
        &self.clicks
    }
}

impl DesktopEnv for SimBackend {
    fn monitors(&self) -> Result<Vec<Monitor>> {
        Ok(self.monitors.clone())
    }

    fn capture(&mut self, region: Region) -> Result<RgbImage> {
        if let Some(next) = self.frames.pop_front() {
            self.last_frame = Some(next);
        }
        let frame = match &self.last_frame {
            Some(frame) => frame.clone(),
            None => RgbImage::new(region.width, region.height),
        };
        // The capture contract promises region-sized buffers.
        if frame.dimensions() != (region.width, region.height) {
            let mut canvas = RgbImage::new(region.width, region.height);
            imageops::replace(&mut canvas, &frame, 0, 0);
            return Ok(canvas);
        }
        Ok(frame)
    }

    fn click(&mut self, x: i32, y: i32, _down_up_delay: Duration) -> Result<()> {
        log::info!("[sim] click at ({x}, {y})");
        self.clicks.push((x, y));
        Ok(())
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        log::debug!("[sim] move to ({x}, {y})");
        Ok(())
    }

    fn find_window(&self, _title_substring: &str) -> Result<Option<BoundingBox>> {
        Ok(self.window)
    }
}
