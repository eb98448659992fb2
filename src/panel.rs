//! The coordinating-thread controller a front end drives.
//!
//! [`BrowserPanel`] turns UI gestures (browse, Enter in the path field, card
//! clicks, slider moves) into session and light-binding calls and hands back
//! the text the widgets should show. All of its methods must be called from
//! the thread that owns it.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{Configuration, SliderOptions};
use crate::error::Error;
use crate::host::HostIntegration;
use crate::last_folder::LastFolderStore;
use crate::light::{EnvironmentLightBinding, intensity_multiplier};
use crate::session::{BrowseSession, SessionOptions, Status};
use crate::tasks::pool::WorkerPool;

pub const TOOLTIP_LIGHT_UPDATED: &str = "✓ Environment Light Updated";

/// Label for the rotation slider.
#[must_use]
pub fn rotation_label(degrees: i32) -> String {
    format!("{degrees}°")
}

/// Label for the intensity slider: the multiplier the light actually gets.
#[must_use]
pub fn intensity_label(ui_value: u32, divisor: f32) -> String {
    format!("{:.1}", intensity_multiplier(ui_value, divisor))
}

pub struct BrowserPanel {
    cfg: Configuration,
    session: BrowseSession,
    binding: EnvironmentLightBinding,
    last_folder: Option<LastFolderStore>,
    path_text: String,
    rotation: i32,
    intensity: u32,
}

impl BrowserPanel {
    /// Build the panel, its worker pool and light binding from `cfg`.
    ///
    /// # Errors
    /// Fails if the worker threads cannot be started.
    pub fn new(cfg: Configuration, host: Arc<dyn HostIntegration>) -> io::Result<Self> {
        let pool = WorkerPool::from_config(&cfg)?;
        let session = BrowseSession::new(pool, SessionOptions::from(&cfg));
        let binding = EnvironmentLightBinding::from_config(host, &cfg);
        let last_folder = cfg.last_folder_path().map(LastFolderStore::new);
        info!(
            workers = session.pool().workers(),
            host = binding.is_available(),
            "browser panel ready"
        );
        Ok(Self::from_parts(cfg, session, binding, last_folder))
    }

    #[must_use]
    pub fn from_parts(
        cfg: Configuration,
        session: BrowseSession,
        binding: EnvironmentLightBinding,
        last_folder: Option<LastFolderStore>,
    ) -> Self {
        let rotation = cfg.sliders.rotation_default;
        let intensity = cfg.sliders.intensity_default;
        Self {
            cfg,
            session,
            binding,
            last_folder,
            path_text: String::new(),
            rotation,
            intensity,
        }
    }

    /// Reopen the remembered folder if there is one and it still exists.
    pub fn restore_last_folder(&mut self) -> Option<Result<usize, Error>> {
        let folder = self.last_folder.as_ref()?.load()?;
        self.path_text = folder.to_string_lossy().into_owned();
        if !folder.exists() {
            debug!(folder = %folder.display(), "remembered folder is gone");
            return None;
        }
        Some(self.session.open_folder(&folder))
    }

    /// Folder picked with the Browse button: remember it, then open it.
    pub fn browse(&mut self, folder: &Path) -> Result<usize, Error> {
        self.path_text = folder.to_string_lossy().into_owned();
        if let Some(store) = &self.last_folder {
            if let Err(err) = store.save(folder) {
                warn!(file = %store.file().display(), error = %err, "failed to save last folder");
            }
        }
        self.session.open_folder(folder)
    }

    /// Enter pressed in the path field.
    pub fn submit_path(&mut self, text: &str) -> Result<usize, Error> {
        let text = text.trim();
        self.path_text = text.to_string();
        self.session.open_folder(&PathBuf::from(text))
    }

    pub fn clear(&mut self) {
        self.session.clear();
    }

    /// Apply thumbnail results that have arrived. Call from the UI loop.
    pub fn pump(&mut self) -> usize {
        self.session.pump()
    }

    /// Block until every thumbnail has reported or `timeout` elapses.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        self.session.wait_until_complete(timeout)
    }

    /// A card was clicked. Returns the confirmation text to flash when the
    /// light was updated and tooltips are on.
    pub fn click_card(&mut self, path: &Path) -> Option<&'static str> {
        if !self.cfg.apply_on_click {
            return None;
        }
        if self.session.item(path).is_none() {
            debug!(path = %path.display(), "click on a card that is not listed");
            return None;
        }
        let applied = self.binding.select_image(path);
        (applied && self.cfg.tooltips).then_some(TOOLTIP_LIGHT_UPDATED)
    }

    /// Rotation slider moved. Returns the new label text.
    pub fn set_rotation(&mut self, degrees: i32) -> String {
        let (lo, hi) = SliderOptions::ROTATION_RANGE;
        self.rotation = degrees.clamp(lo, hi);
        self.binding.set_rotation(self.rotation);
        self.rotation_label()
    }

    /// Intensity slider moved. Returns the new label text.
    pub fn set_intensity(&mut self, ui_value: u32) -> String {
        let (lo, hi) = SliderOptions::INTENSITY_RANGE;
        self.intensity = ui_value.clamp(lo, hi);
        self.binding.set_intensity(self.intensity);
        self.intensity_label()
    }

    #[must_use]
    pub fn rotation(&self) -> i32 {
        self.rotation
    }

    #[must_use]
    pub fn intensity(&self) -> u32 {
        self.intensity
    }

    #[must_use]
    pub fn rotation_label(&self) -> String {
        rotation_label(self.rotation)
    }

    #[must_use]
    pub fn intensity_label(&self) -> String {
        intensity_label(self.intensity, self.binding.intensity_divisor())
    }

    #[must_use]
    pub fn path_text(&self) -> &str {
        &self.path_text
    }

    #[must_use]
    pub fn status(&self) -> &Status {
        self.session.status()
    }

    #[must_use]
    pub fn session(&self) -> &BrowseSession {
        &self.session
    }

    #[must_use]
    pub fn config(&self) -> &Configuration {
        &self.cfg
    }
}
