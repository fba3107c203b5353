//! Real desktop backend: xcap for capture and enumeration, enigo for
//! pointer injection.

use std::thread;
use std::time::Duration;

use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};
use image::{DynamicImage, RgbImage, imageops};

use crate::backend::DesktopEnv;
use crate::error::{Error, Result};
use crate::geometry::{BoundingBox, Monitor, Region};

/// Capture and input against the live desktop.
pub struct DesktopBackend {
    enigo: Enigo,
    restore_cursor: bool,
}

impl DesktopBackend {
    pub fn new() -> Result<Self> {
        let enigo =
            Enigo::new(&Settings::default()).map_err(|e| Error::Input(e.to_string()))?;
        Ok(Self {
            enigo,
            restore_cursor: true,
        })
    }

    /// Keep the pointer wherever the click left it instead of jumping back.
    pub fn leave_cursor(mut self) -> Self {
        self.restore_cursor = false;
        self
    }
}

impl DesktopEnv for DesktopBackend {
    fn monitors(&self) -> Result<Vec<Monitor>> {
        let all = xcap::Monitor::all().map_err(|e| Error::Capture(e.to_string()))?;
        let mut monitors = Vec::with_capacity(all.len());
        let mut primary_index = 0usize;
        for (index, monitor) in all.iter().enumerate() {
            let x = monitor.x().map_err(|e| Error::Capture(e.to_string()))?;
            let y = monitor.y().map_err(|e| Error::Capture(e.to_string()))?;
            let width = monitor.width().map_err(|e| Error::Capture(e.to_string()))?;
            let height = monitor.height().map_err(|e| Error::Capture(e.to_string()))?;
            if monitor.is_primary().unwrap_or(false) {
                primary_index = index;
            }
            monitors.push(Monitor::new(x, y, width, height)?);
        }
        if monitors.is_empty() {
            return Err(Error::Capture("no monitors enumerated".into()));
        }
        // The mapper expects the primary display at index 0.
        monitors.rotate_left(primary_index);
        log::info!("enumerated {} monitor(s)", monitors.len());
        Ok(monitors)
    }

    fn capture(&mut self, region: Region) -> Result<RgbImage> {
        let mut canvas = RgbImage::new(region.width, region.height);
        let all = xcap::Monitor::all().map_err(|e| Error::Capture(e.to_string()))?;

        for monitor in &all {
            let x = monitor.x().map_err(|e| Error::Capture(e.to_string()))?;
            let y = monitor.y().map_err(|e| Error::Capture(e.to_string()))?;
            let width = monitor.width().map_err(|e| Error::Capture(e.to_string()))?;
            let height = monitor.height().map_err(|e| Error::Capture(e.to_string()))?;

            // Skip displays entirely outside the requested region.
            if x >= region.left + region.width as i32
                || y >= region.top + region.height as i32
                || x + width as i32 <= region.left
                || y + height as i32 <= region.top
            {
                continue;
            }

            let shot = monitor
                .capture_image()
                .map_err(|e| Error::Capture(e.to_string()))?;
            let mut rgb = DynamicImage::ImageRgba8(shot).to_rgb8();
            // HiDPI displays capture at physical resolution; bring the
            // buffer back to the logical geometry the coordinates use.
            if rgb.dimensions() != (width, height) {
                rgb = imageops::resize(&rgb, width, height, imageops::FilterType::Triangle);
            }

            imageops::replace(
                &mut canvas,
                &rgb,
                (x - region.left) as i64,
                (y - region.top) as i64,
            );
        }

        Ok(canvas)
    }

    fn click(&mut self, x: i32, y: i32, down_up_delay: Duration) -> Result<()> {
        let restore = if self.restore_cursor {
            self.enigo.location().ok()
        } else {
            None
        };

        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| Error::Input(e.to_string()))?;
        self.enigo
            .button(Button::Left, Direction::Press)
            .map_err(|e| Error::Input(e.to_string()))?;
        if !down_up_delay.is_zero() {
            thread::sleep(down_up_delay);
        }
        self.enigo
            .button(Button::Left, Direction::Release)
            .map_err(|e| Error::Input(e.to_string()))?;

        log::info!("clicked at ({x}, {y})");

        if let Some((px, py)) = restore {
            self.enigo
                .move_mouse(px, py, Coordinate::Abs)
                .map_err(|e| Error::Input(e.to_string()))?;
        }
        Ok(())
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| Error::Input(e.to_string()))
    }

    fn find_window(&self, title_substring: &str) -> Result<Option<BoundingBox>> {
        let needle = title_substring.to_lowercase();
        let windows = xcap::Window::all().map_err(|e| Error::Capture(e.to_string()))?;

        for window in &windows {
            if window.is_minimized().unwrap_or(true) {
                continue;
            }
            let Ok(title) = window.title() else {
                continue;
            };
            if title.is_empty() || !title.to_lowercase().contains(&needle) {
                continue;
            }
            let (Ok(x), Ok(y), Ok(width), Ok(height)) =
                (window.x(), window.y(), window.width(), window.height())
            else {
                continue;
            };
            // Zero-sized rects show up for some tool windows; skip them.
            let Ok(bbox) = BoundingBox::new(x, y, x + width as i32, y + height as i32) else {
                continue;
            };
            log::debug!("window '{title}' matches '{title_substring}': {bbox:?}");
            return Ok(Some(bbox));
        }
        Ok(None)
    }
}
