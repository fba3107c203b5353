//! Desktop capability interface: capture, pointer injection, window lookup.
//!
//! The scanning core talks to the operating system only through
//! [`DesktopEnv`]. Exactly one implementation is selected at startup, the
//! real desktop backend or the simulator, so the core has no
//! platform-conditional branches of its own.

mod desktop;
mod sim;

use std::time::Duration;

use image::RgbImage;

use crate::error::Result;
use crate::geometry::{BoundingBox, Monitor, Region};

pub use desktop::DesktopBackend;
pub use sim::{SimBackend, sim_monitors};

/// Synchronous desktop capabilities consumed by the scanner.
pub trait DesktopEnv {
    /// Enumerate displays, primary first. Ordered and stable for the
    /// lifetime of the process.
    fn monitors(&self) -> Result<Vec<Monitor>>;

    /// Grab the pixels of `region` as RGB with origin top-left. The
    /// returned buffer always has exactly the region's dimensions.
    fn capture(&mut self, region: Region) -> Result<RgbImage>;

    /// Press-then-release at absolute screen coordinates, holding the
    /// button for `down_up_delay`, restoring the prior pointer position
    /// afterwards.
    fn click(&mut self, x: i32, y: i32, down_up_delay: Duration) -> Result<()>;

    /// Two clicks separated by `delay`.
    fn double_click(&mut self, x: i32, y: i32, delay: Duration) -> Result<()> {
        self.click(x, y, delay)?;
        std::thread::sleep(delay);
        self.click(x, y, delay)
    }

    /// Move the pointer without clicking.
    fn move_to(&mut self, x: i32, y: i32) -> Result<()>;

    /// Screen-coordinate rectangle of the first visible window whose title
    /// contains `title_substring` (case-insensitive). `None` is the
    /// expected soft miss; `Err` means enumeration itself failed.
    fn find_window(&self, title_substring: &str) -> Result<Option<BoundingBox>>;
}
