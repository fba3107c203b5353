//! Automated download clicker for Nexus mod workflows.
//!
//! Captures a (possibly multi-monitor) screen region each tick, locates
//! known button templates with FAST/BRIEF feature matching, maps image
//! coordinates back to screen coordinates, and drives a bounded-retry state
//! machine that clicks through the Vortex and website download steps.

pub mod backend;
pub mod config;
pub mod detect;
pub mod error;
pub mod geometry;
pub mod scanner;

pub use backend::{DesktopBackend, DesktopEnv, SimBackend, sim_monitors};
pub use config::AppConfig;
pub use detect::{ButtonDetector, ButtonKind, DetectionResult, TemplateCandidate, TemplateRegistry};
pub use error::{Error, Result};
pub use geometry::{BoundingBox, Monitor, Region, ScreenMapper};
pub use scanner::{ScanState, ScanStatus, Scanner};
