use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

/// Names the host contract used to place the environment light.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct LightOptions {
    /// Scene path the light lives under.
    pub parent_path: String,
    /// Host type name identifying an environment light.
    pub type_name: String,
    /// Name given to the light when it has to be created.
    pub node_name: String,
    pub map_param: String,
    pub rotation_param: String,
    pub intensity_param: String,
}

impl Default for LightOptions {
    fn default() -> Self {
        Self {
            parent_path: "/obj".into(),
            type_name: "envlight".into(),
            node_name: "HDRI_Environment_Light".into(),
            map_param: "env_map".into(),
            rotation_param: "ry".into(),
            intensity_param: "light_intensity".into(),
        }
    }
}

/// Slider defaults and the intensity mapping.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SliderOptions {
    pub rotation_default: i32,
    pub intensity_default: u32,
    /// UI intensity is divided by this to get the light multiplier.
    pub intensity_divisor: f32,
}

impl SliderOptions {
    pub const ROTATION_RANGE: (i32, i32) = (-360, 360);
    pub const INTENSITY_RANGE: (u32, u32) = (0, 100);

    fn validate(&self) -> Result<()> {
        let (lo, hi) = Self::ROTATION_RANGE;
        ensure!(
            (lo..=hi).contains(&self.rotation_default),
            "sliders.rotation-default must be within [{lo}, {hi}]"
        );
        let (lo, hi) = Self::INTENSITY_RANGE;
        ensure!(
            (lo..=hi).contains(&self.intensity_default),
            "sliders.intensity-default must be within [{lo}, {hi}]"
        );
        ensure!(
            self.intensity_divisor > 0.0,
            "sliders.intensity-divisor must be positive"
        );
        Ok(())
    }
}

impl Default for SliderOptions {
    fn default() -> Self {
        Self {
            rotation_default: 0,
            intensity_default: 10,
            intensity_divisor: 5.0,
        }
    }
}

/// Startup configuration for the browser panel.
///
/// Built once and handed to the session, pool and light binding; nothing
/// reads process-wide switches after this point.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Attach to the host scene; when false every host call is a no-op.
    pub host_integration: bool,
    /// Clicking a card assigns it to the environment light.
    pub apply_on_click: bool,
    /// Return confirmation text after a light update.
    pub tooltips: bool,
    /// Decode on worker threads; when false decode runs inline on submit.
    pub multithreading: bool,
    /// Worker thread cap. Defaults to half the available cores, at least one.
    pub max_workers: Option<usize>,
    /// Log per-task and per-folder wall time at info level.
    pub timing: bool,
    /// Edge of the square box previews are fitted into, in pixels.
    pub thumbnail_size: u32,
    /// Max characters of a decode error shown in a card.
    pub error_message_limit: usize,
    pub grid_columns: usize,
    /// File extensions (without dot, any case) listed from a folder.
    pub extensions: Vec<String>,
    /// Where the last browsed folder is remembered. Defaults to
    /// `~/last_folder.txt`.
    pub last_folder_file: Option<PathBuf>,
    pub light: LightOptions,
    pub sliders: SliderOptions,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(self.thumbnail_size > 0, "thumbnail-size must be greater than zero");
        ensure!(
            self.error_message_limit > 0,
            "error-message-limit must be greater than zero"
        );
        ensure!(self.grid_columns > 0, "grid-columns must be greater than zero");
        ensure!(!self.extensions.is_empty(), "extensions must not be empty");
        ensure!(
            self.extensions.iter().all(|e| !e.trim().is_empty()),
            "extensions must not contain blank entries"
        );
        if let Some(n) = self.max_workers {
            ensure!(n > 0, "max-workers must be greater than zero");
        }
        self.sliders.validate().context("invalid slider configuration")?;
        Ok(self)
    }

    /// Worker count for the thumbnail pool.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.max_workers.unwrap_or_else(default_worker_count).max(1)
    }

    /// Extensions normalised to lowercase without a leading dot.
    #[must_use]
    pub fn normalized_extensions(&self) -> Vec<String> {
        self.extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .collect()
    }

    #[must_use]
    pub fn last_folder_path(&self) -> Option<PathBuf> {
        self.last_folder_file
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join("last_folder.txt")))
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            host_integration: true,
            apply_on_click: true,
            tooltips: true,
            multithreading: true,
            max_workers: None,
            timing: false,
            thumbnail_size: 220,
            error_message_limit: 30,
            grid_columns: 4,
            extensions: vec!["exr".into(), "hdr".into()],
            last_folder_file: None,
            light: LightOptions::default(),
            sliders: SliderOptions::default(),
        }
    }
}

/// Half the available cores, never less than one.
#[must_use]
pub fn default_worker_count() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores / 2).max(1)
}
