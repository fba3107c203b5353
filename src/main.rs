//! CLI entry point: flag parsing, logging setup, backend selection.

use std::io::BufRead;
use std::path::PathBuf;
use std::thread;

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::bounded;
use log::LevelFilter;

use nexus_autodl::{
    AppConfig, DesktopBackend, DesktopEnv, ScanStatus, Scanner, SimBackend, sim_monitors,
};

#[derive(Parser, Debug)]
#[command(name = "nexus-autodl", about = "Automated Nexus mods download clicker")]
struct Cli {
    /// Drive the Vortex workflow (scan the mod-manager window first).
    #[arg(long)]
    vortex: bool,

    /// Use legacy button templates and legacy popup dialogs.
    #[arg(long)]
    legacy: bool,

    /// Capture only the primary monitor.
    #[arg(long)]
    force_primary: bool,

    /// Title substring of the window scanned during the vortex phase.
    #[arg(long)]
    window_title: Option<String>,

    /// Directory holding the button template images.
    #[arg(long)]
    assets_dir: Option<PathBuf>,

    /// Write annotated detection frames into this directory.
    #[arg(long)]
    debug_frame_dir: Option<PathBuf>,

    /// Minimum good feature matches for the vortex-button search.
    #[arg(long)]
    min_matches: Option<usize>,

    /// Lowe ratio-test threshold.
    #[arg(long)]
    ratio: Option<f32>,

    /// Seconds between scan ticks.
    #[arg(long)]
    click_delay: Option<f64>,

    /// Seconds to settle after clicking away a popup dialog.
    #[arg(long)]
    retry_delay: Option<f64>,

    /// Consecutive web-phase misses before the cycle restarts.
    #[arg(long)]
    retry_limit: Option<u32>,

    /// Load configuration from a JSON file; explicit flags override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run against the simulated desktop instead of the real one.
    #[arg(long)]
    simulate: bool,

    /// Stop after this many scan ticks.
    #[arg(long)]
    max_iterations: Option<u64>,

    /// Enable debug logging.
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    /// Merge file-based config (if any) with explicit flag overrides.
    fn build_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => AppConfig::default(),
        };

        config.vortex |= self.vortex;
        config.legacy |= self.legacy;
        config.force_primary |= self.force_primary;
        if let Some(title) = &self.window_title {
            config.window_title = title.clone();
        }
        if let Some(dir) = &self.assets_dir {
            config.assets_dir = dir.clone();
        }
        if let Some(dir) = &self.debug_frame_dir {
            config.debug_frame_dir = Some(dir.clone());
        }
        if let Some(min_matches) = self.min_matches {
            config.min_matches = min_matches;
        }
        if let Some(ratio) = self.ratio {
            config.ratio_threshold = ratio;
        }
        if let Some(delay) = self.click_delay {
            config.click_delay = delay;
        }
        if let Some(delay) = self.retry_delay {
            config.retry_delay = delay;
        }
        if let Some(limit) = self.retry_limit {
            config.wabbajack_retry_limit = limit;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();

    let config = cli.build_config()?;
    config.validate()?;
    log::debug!("configuration: {config:?}");

    if cli.simulate {
        log::warn!("simulation mode: no real clicking will occur");
        run(SimBackend::new(sim_monitors()), config, cli.max_iterations)
    } else {
        run(DesktopBackend::new()?, config, cli.max_iterations)
    }
}

fn run<D: DesktopEnv>(
    backend: D,
    config: AppConfig,
    max_iterations: Option<u64>,
) -> anyhow::Result<()> {
    // Cooperative cancellation: the scanner checks this channel between
    // ticks; pressing Enter (or closing stdin) requests a stop.
    let (stop_tx, stop_rx) = bounded(1);
    thread::spawn(move || {
        let stdin = std::io::stdin();
        let _ = stdin.lock().lines().next();
        let _ = stop_tx.send(());
    });

    let mut scanner = Scanner::new(config, backend, stop_rx)?;

    log::info!("starting scan loop (press Enter to stop)");
    let mut last_action = String::new();
    let result = scanner.scan_loop(max_iterations, |status: &ScanStatus| {
        if status.current_action != last_action {
            log::info!("[{}] {}", status.state, status.current_action);
            last_action = status.current_action.clone();
        }
    });

    let status = scanner.status();
    log::info!(
        "scan finished in state '{}' after {} click(s)",
        status.state,
        status.clicks_count
    );
    for error in &status.errors {
        log::error!("recorded fault: {error}");
    }

    result.map_err(Into::into)
}
