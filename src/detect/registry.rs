//! Template asset loading and per-mode candidate resolution.

use std::collections::HashMap;
use std::path::Path;

use image::imageops;

use crate::detect::ButtonKind;
use crate::detect::features::{self, Descriptor};
use crate::error::{Error, Result};

/// Required assets present in every install.
const REQUIRED_ASSETS: [(ButtonKind, &str); 6] = [
    (ButtonKind::Vortex, "VortexDownloadButton.png"),
    (ButtonKind::Website, "WebsiteDownloadButton.png"),
    (ButtonKind::Wabbajack, "WabbajackDownloadButton.png"),
    (ButtonKind::Click, "ClickHereButton.png"),
    (ButtonKind::Understood, "UnderstoodButton.png"),
    (ButtonKind::Staging, "StagingButton.png"),
];

/// Refreshed-art variants; absent on older installs.
const OPTIONAL_ASSETS: [(ButtonKind, &str); 2] = [
    (ButtonKind::Vortex, "VortexDownloadButtonNew.png"),
    (ButtonKind::Website, "WebsiteDownloadButtonNew.png"),
];

/// One visual variant of one button: its descriptor set and pixel size.
/// Computed once at load time, read-only afterwards.
#[derive(Debug, Clone)]
pub struct TemplateCandidate {
    pub descriptors: Vec<Descriptor>,
    pub width: u32,
    pub height: u32,
}

/// Resolves the active template candidates per button kind.
///
/// The vortex and website buttons exist in a legacy and a refreshed visual
/// style; `use_legacy` picks which one detection runs against. All other
/// kinds have a single variant shared by both modes.
pub struct TemplateRegistry {
    candidates: HashMap<ButtonKind, Vec<TemplateCandidate>>,
}

impl TemplateRegistry {
    /// Load every asset from `assets_dir` and resolve the candidate lists
    /// for the selected mode.
    ///
    /// A missing required asset is fatal. A missing optional asset leaves
    /// the affected kind without candidates in non-legacy mode, warned once
    /// here rather than on every tick.
    pub fn load(assets_dir: &Path, use_legacy: bool) -> Result<Self> {
        let mut required = HashMap::new();
        for (kind, filename) in REQUIRED_ASSETS {
            let path = assets_dir.join(filename);
            if !path.exists() {
                return Err(Error::AssetMissing { path });
            }
            required.insert(kind, load_candidate(&path)?);
            log::debug!("loaded template asset {filename}");
        }

        let mut refreshed = HashMap::new();
        for (kind, filename) in OPTIONAL_ASSETS {
            let path = assets_dir.join(filename);
            if !path.exists() {
                log::debug!("optional template asset missing: {filename}");
                continue;
            }
            refreshed.insert(kind, load_candidate(&path)?);
            log::debug!("loaded optional template asset {filename}");
        }

        let mut candidates: HashMap<ButtonKind, Vec<TemplateCandidate>> = HashMap::new();
        for (kind, _) in REQUIRED_ASSETS {
            let styled = matches!(kind, ButtonKind::Vortex | ButtonKind::Website);
            let chosen = if styled && !use_legacy {
                refreshed.remove(&kind)
            } else {
                required.remove(&kind)
            };
            let list: Vec<TemplateCandidate> = chosen.into_iter().collect();
            if list.is_empty() {
                let mode = if use_legacy { "legacy" } else { "new" };
                log::warn!(
                    "{kind} {mode} template not available; detection for this button is disabled"
                );
            }
            candidates.insert(kind, list);
        }

        let mode = if use_legacy { "legacy" } else { "new" };
        log::info!("template registry loaded with {mode} button styles");
        Ok(Self { candidates })
    }

    /// Ordered candidate list for a button kind under the active mode.
    /// Empty when the variant for this mode is unavailable.
    pub fn candidates(&self, kind: ButtonKind) -> &[TemplateCandidate] {
        self.candidates.get(&kind).map_or(&[], Vec::as_slice)
    }
}

fn load_candidate(path: &Path) -> Result<TemplateCandidate> {
    let rgb = image::open(path)
        .map_err(|source| Error::AssetLoad {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    let gray = imageops::grayscale(&rgb);
    let extracted = features::extract(&gray);
    if extracted.is_empty() {
        log::warn!(
            "template {} yields no descriptors; it will never match",
            path.display()
        );
    }
    Ok(TemplateCandidate {
        descriptors: extracted.descriptors,
        width: rgb.width(),
        height: rgb.height(),
    })
}
