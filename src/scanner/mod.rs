//! The scan orchestrator: capture -> detect -> click, one tick at a time.
//!
//! A single logical thread runs the loop; every tick fully completes before
//! the next begins. Detection misses and window-not-found are expected soft
//! conditions that drive the retry logic. Cancellation is cooperative and
//! observed between ticks. Anything else aborts the loop: the fault is
//! recorded in the status, the state flips to [`ScanState::Error`] and the
//! error propagates to the caller.

mod debug_frames;

use std::fmt;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError};
use image::RgbImage;

use crate::backend::DesktopEnv;
use crate::config::AppConfig;
use crate::detect::{ButtonDetector, ButtonKind, DetectionResult, TemplateRegistry};
use crate::error::Result;
use crate::geometry::{BoundingBox, ScreenMapper};

pub use debug_frames::DebugRecorder;

/// Popup and web-phase searches run with a lower match gate than the
/// vortex-button search; those buttons are large and unobstructed.
const DIALOG_MIN_MATCHES: usize = 6;
/// Button hold time between press and release.
const BUTTON_HOLD: Duration = Duration::from_millis(100);
/// Settle time after clicking the legacy confirmation dialog.
const CLICK_DIALOG_SETTLE: Duration = Duration::from_secs(3);

/// Base term of the vortex-window border-exclusion heuristic.
pub const WINDOW_PAD_BASE: f64 = 5.0;
/// Divisor applied to the window x position in the same heuristic.
pub const WINDOW_PAD_X_SCALE: f64 = 512.0;

/// Inward pad fraction applied to the vortex window before searching it.
///
/// Empirical: the margin widens as the window's x approaches the left
/// edge. Takes the raw (screen-coordinate) window x, which is how the
/// heuristic was tuned. Extreme positions can make the fraction collapse
/// the box entirely; callers treat that as a soft degenerate-geometry miss.
pub fn window_pad_fraction(window_x: i32) -> f64 {
    1.0 / (WINDOW_PAD_BASE + (WINDOW_PAD_BASE - window_x as f64 / WINDOW_PAD_X_SCALE))
}

/// Scanner state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    WaitingForVortex,
    VortexClicked,
    WaitingForWeb,
    WebClicked,
    HandlingPopup,
    Error,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanState::Idle => "idle",
            ScanState::WaitingForVortex => "waiting_for_vortex",
            ScanState::VortexClicked => "vortex_clicked",
            ScanState::WaitingForWeb => "waiting_for_web",
            ScanState::WebClicked => "web_clicked",
            ScanState::HandlingPopup => "handling_popup",
            ScanState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Snapshot of the scanning operation, published once per tick.
///
/// Owned and mutated exclusively by the [`Scanner`]; the status callback
/// only ever sees it as a shared reference between mutations.
#[derive(Debug, Clone)]
pub struct ScanStatus {
    pub state: ScanState,
    pub current_action: String,
    pub detections: Vec<DetectionResult>,
    pub clicks_count: u64,
    pub errors: Vec<String>,
    pub web_retry_count: u32,
}

impl Default for ScanStatus {
    fn default() -> Self {
        Self {
            state: ScanState::Idle,
            current_action: "Initializing...".into(),
            detections: Vec::new(),
            clicks_count: 0,
            errors: Vec::new(),
            web_retry_count: 0,
        }
    }
}

/// Outcome of one web-phase attempt.
enum WebOutcome {
    /// A download button was clicked.
    Clicked,
    /// Retry budget exhausted; restart the whole cycle.
    Restart,
    /// Nothing found, retry budget remaining.
    Miss,
}

/// Orchestrates the scanning and clicking workflow over a desktop backend.
pub struct Scanner<D: DesktopEnv> {
    config: AppConfig,
    backend: D,
    mapper: ScreenMapper,
    detector: ButtonDetector,
    recorder: DebugRecorder,
    stop: Receiver<()>,
    status: ScanStatus,
    iteration: u64,
    vortex_clicked: bool,
    web_clicked: bool,
}

impl<D: DesktopEnv> Scanner<D> {
    /// Build the scanner: enumerate monitors, establish the capture
    /// region, load the template registry. All failures here are fatal
    /// (configuration or asset errors).
    pub fn new(config: AppConfig, backend: D, stop: Receiver<()>) -> Result<Self> {
        let monitors = backend.monitors()?;
        let mapper = ScreenMapper::new(monitors, config.force_primary)?;
        let registry = TemplateRegistry::load(&config.assets_dir, config.legacy)?;
        let recorder = DebugRecorder::new(config.debug_frame_dir.clone())?;

        log::info!("scanner initialized");
        Ok(Self {
            config,
            backend,
            mapper,
            detector: ButtonDetector::new(registry),
            recorder,
            stop,
            status: ScanStatus::default(),
            iteration: 0,
            vortex_clicked: false,
            web_clicked: false,
        })
    }

    pub fn status(&self) -> &ScanStatus {
        &self.status
    }

    /// Run the scan loop until cancelled, the optional iteration budget
    /// runs out, or a fatal fault occurs.
    ///
    /// `on_status` is invoked with a snapshot once per tick (and for the
    /// final transition); it must not block for long.
    pub fn scan_loop<F>(&mut self, max_iterations: Option<u64>, mut on_status: F) -> Result<()>
    where
        F: FnMut(&ScanStatus),
    {
        self.status.state = if self.config.vortex {
            ScanState::WaitingForVortex
        } else {
            ScanState::WaitingForWeb
        };
        self.status.current_action = "Scanning".into();
        on_status(&self.status);

        loop {
            if self.stop_requested() {
                self.status.state = ScanState::Idle;
                self.status.current_action = "Stopped by user".into();
                on_status(&self.status);
                log::info!("scan stopped by user");
                return Ok(());
            }
            if max_iterations.is_some_and(|max| self.iteration >= max) {
                return Ok(());
            }
            self.iteration += 1;

            if let Err(fault) = self.tick() {
                let message = format!("scanner fault: {fault}");
                log::error!("{message}");
                self.status.errors.push(message);
                self.status.state = ScanState::Error;
                on_status(&self.status);
                return Err(fault);
            }

            on_status(&self.status);
            thread::sleep(self.config.click_interval());
        }
    }

    fn stop_requested(&self) -> bool {
        match self.stop.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => true,
            Err(TryRecvError::Empty) => false,
        }
    }

    /// One capture-detect-act cycle.
    fn tick(&mut self) -> Result<()> {
        let frame = self.backend.capture(self.mapper.capture_region())?;

        if self.config.vortex && !self.vortex_clicked {
            self.status.state = ScanState::WaitingForVortex;
            if self.vortex_phase(&frame)? {
                self.vortex_clicked = true;
                self.status.state = ScanState::VortexClicked;
            }
        } else if self.config.vortex && self.web_clicked {
            self.status.state = ScanState::WebClicked;
            if self.click_dialog_phase(&frame)? {
                // Dialog handled; start the next mod cycle.
                self.vortex_clicked = false;
                self.web_clicked = false;
                self.status.state = ScanState::WaitingForVortex;
            }
        } else {
            self.status.state = ScanState::WaitingForWeb;
            match self.web_phase(&frame)? {
                WebOutcome::Clicked => {
                    self.status.state = ScanState::WebClicked;
                    if self.config.vortex {
                        self.web_clicked = true;
                    } else {
                        // No dialog phase without the vortex workflow;
                        // restart the cycle immediately.
                        self.vortex_clicked = false;
                        self.web_clicked = false;
                    }
                }
                WebOutcome::Restart => {
                    self.vortex_clicked = false;
                    self.web_clicked = false;
                }
                WebOutcome::Miss => {}
            }
        }

        Ok(())
    }

    /// Search the mod-manager window for the vortex download button.
    /// Returns `true` once it has been clicked.
    fn vortex_phase(&mut self, frame: &RgbImage) -> Result<bool> {
        let Some(window) = self.backend.find_window(&self.config.window_title)? else {
            self.set_action(format!("Waiting for {} window...", self.config.window_title));
            return Ok(false);
        };

        let (ix1, iy1) = self.mapper.monitor_to_image(window.x1(), window.y1());
        let (ix2, iy2) = self.mapper.monitor_to_image(window.x2(), window.y2());
        // The pad heuristic uses the raw window x, not the converted one.
        let search_box = BoundingBox::new(ix1, iy1, ix2, iy2)
            .and_then(|b| b.pad(window_pad_fraction(window.x1())));

        if self.config.legacy && self.popup_check(frame)? {
            return Ok(false);
        }

        let Ok(search_box) = search_box else {
            log::debug!("vortex window box degenerate after padding");
            self.set_action("Searching for Vortex button...");
            return Ok(false);
        };

        let detection = self.detector.detect(
            frame,
            ButtonKind::Vortex,
            self.config.min_matches,
            self.config.ratio_threshold,
            Some(search_box),
        );
        if let Some(detection) = detection {
            self.set_action("Clicking Vortex download button");
            self.recorder
                .record(frame, &detection, self.iteration, "vortex_download");
            self.click_detection(&detection)?;
            return Ok(true);
        }

        self.set_action("Searching for Vortex button...");
        Ok(false)
    }

    /// Legacy popup dialogs take priority over the vortex search. Returns
    /// `true` when one was clicked; the tick then ends early so the next
    /// capture sees the dialog gone.
    fn popup_check(&mut self, frame: &RgbImage) -> Result<bool> {
        let popups = [
            (ButtonKind::Understood, "Clicking 'Understood' button"),
            (ButtonKind::Staging, "Clicking 'Staging' button"),
        ];
        for (kind, action) in popups {
            let detection = self.detector.detect(
                frame,
                kind,
                DIALOG_MIN_MATCHES,
                self.config.ratio_threshold,
                None,
            );
            if let Some(detection) = detection {
                self.status.state = ScanState::HandlingPopup;
                self.set_action(action);
                self.recorder
                    .record(frame, &detection, self.iteration, &format!("popup_{kind}"));
                self.click_detection(&detection)?;
                thread::sleep(self.config.retry_interval());
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Search for the website download button (and the wabbajack fallback
    /// when the vortex workflow is disabled), first match wins.
    fn web_phase(&mut self, frame: &RgbImage) -> Result<WebOutcome> {
        let mut targets = vec![(ButtonKind::Website, "website download button")];
        if !self.config.vortex {
            targets.push((ButtonKind::Wabbajack, "Wabbajack download button"));
        }

        for &(kind, label) in &targets {
            let detection = self.detector.detect(
                frame,
                kind,
                DIALOG_MIN_MATCHES,
                self.config.ratio_threshold,
                None,
            );
            if let Some(detection) = detection {
                self.set_action(format!("Clicking {label}"));
                self.recorder
                    .record(frame, &detection, self.iteration, &format!("web_{kind}"));
                self.click_detection(&detection)?;
                self.status.web_retry_count = 0;
                return Ok(WebOutcome::Clicked);
            }
        }

        self.status.web_retry_count += 1;
        if self.status.web_retry_count >= self.config.wabbajack_retry_limit {
            log::info!("web button not found, restarting the cycle");
            self.set_action("Restarting (button not found)");
            self.status.web_retry_count = 0;
            return Ok(WebOutcome::Restart);
        }

        let names: Vec<&str> = targets.iter().map(|&(_, label)| label).collect();
        self.set_action(format!(
            "Searching for {}... (attempt {}/{})",
            names.join(" or "),
            self.status.web_retry_count,
            self.config.wabbajack_retry_limit
        ));
        Ok(WebOutcome::Miss)
    }

    /// Legacy confirmation dialog after the website click. Returns `true`
    /// once the cycle may restart.
    fn click_dialog_phase(&mut self, frame: &RgbImage) -> Result<bool> {
        if !self.config.legacy {
            self.set_action("Skipping legacy click dialog");
            return Ok(true);
        }

        let detection = self.detector.detect(
            frame,
            ButtonKind::Click,
            DIALOG_MIN_MATCHES,
            self.config.ratio_threshold,
            None,
        );
        if let Some(detection) = detection {
            self.set_action("Clicking dialog button");
            self.recorder
                .record(frame, &detection, self.iteration, "click_dialog");
            self.click_detection(&detection)?;
            thread::sleep(CLICK_DIALOG_SETTLE);
            return Ok(true);
        }

        self.set_action("Waiting for click dialog...");
        Ok(false)
    }

    /// Convert to screen coordinates and dispatch the click.
    fn click_detection(&mut self, detection: &DetectionResult) -> Result<()> {
        let (x, y) = self.mapper.image_to_monitor(detection.x, detection.y);
        self.backend.click(x, y, BUTTON_HOLD)?;
        self.status.clicks_count += 1;
        self.status.detections.push(*detection);
        Ok(())
    }

    fn set_action(&mut self, action: impl Into<String>) {
        self.status.current_action = action.into();
    }
}
