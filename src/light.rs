//! Applies browser choices to the host's environment light.
//!
//! Host failures never escape this module: each call logs and reports
//! whether anything was applied, so the browser keeps working without a host.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{Configuration, LightOptions, SliderOptions};
use crate::error::HostError;
use crate::host::{EntityInfo, EntityRef, HostIntegration, NoHost, ParamValue};

/// Light multiplier for a UI intensity value.
#[must_use]
pub fn intensity_multiplier(ui_value: u32, divisor: f32) -> f64 {
    f64::from(ui_value) / f64::from(divisor)
}

pub struct EnvironmentLightBinding {
    host: Arc<dyn HostIntegration>,
    light: LightOptions,
    intensity_divisor: f32,
}

impl EnvironmentLightBinding {
    #[must_use]
    pub fn new(host: Arc<dyn HostIntegration>, light: LightOptions, intensity_divisor: f32) -> Self {
        Self {
            host,
            light,
            intensity_divisor,
        }
    }

    /// Bind to `host`, or to [`NoHost`] when host integration is switched off.
    #[must_use]
    pub fn from_config(host: Arc<dyn HostIntegration>, cfg: &Configuration) -> Self {
        let host: Arc<dyn HostIntegration> = if cfg.host_integration {
            host
        } else {
            Arc::new(NoHost)
        };
        Self::new(host, cfg.light.clone(), cfg.sliders.intensity_divisor)
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.host.is_available()
    }

    #[must_use]
    pub fn intensity_divisor(&self) -> f32 {
        self.intensity_divisor
    }

    /// Point the environment light at `path`, creating the light if the
    /// scene has none. Returns whether the map was set.
    pub fn select_image(&self, path: &Path) -> bool {
        if !self.is_available() {
            debug!(path = %path.display(), "no host; selection not applied");
            return false;
        }
        match self.assign_map(path) {
            Ok(entity) => {
                info!(light = %entity, path = %path.display(), "environment map assigned");
                true
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not assign environment map");
                false
            }
        }
    }

    /// Rotate an existing light about the vertical axis. Values are clamped
    /// to the slider range. No light, no effect.
    pub fn set_rotation(&self, degrees: i32) -> bool {
        let (lo, hi) = SliderOptions::ROTATION_RANGE;
        let degrees = degrees.clamp(lo, hi);
        self.set_on_existing(&self.light.rotation_param, ParamValue::Float(f64::from(degrees)))
    }

    /// Set an existing light's intensity from a UI value in `[0, 100]`.
    /// No light, no effect.
    pub fn set_intensity(&self, ui_value: u32) -> bool {
        let (lo, hi) = SliderOptions::INTENSITY_RANGE;
        let ui_value = ui_value.clamp(lo, hi);
        let multiplier = intensity_multiplier(ui_value, self.intensity_divisor);
        self.set_on_existing(&self.light.intensity_param, ParamValue::Float(multiplier))
    }

    fn find_light(&self) -> Result<Option<EntityRef>, HostError> {
        let type_name = self.light.type_name.as_str();
        self.host
            .find_child(&self.light.parent_path, &|info: &EntityInfo<'_>| {
                info.type_name == type_name
            })
    }

    fn assign_map(&self, path: &Path) -> Result<EntityRef, HostError> {
        let entity = match self.find_light()? {
            Some(entity) => entity,
            None => {
                let entity = self.host.create_child(
                    &self.light.parent_path,
                    &self.light.type_name,
                    &self.light.node_name,
                )?;
                info!(light = %entity, "created environment light");
                entity
            }
        };
        self.host.set_param(
            &entity,
            &self.light.map_param,
            ParamValue::Str(path.to_string_lossy().into_owned()),
        )?;
        Ok(entity)
    }

    fn set_on_existing(&self, param: &str, value: ParamValue) -> bool {
        if !self.is_available() {
            return false;
        }
        let entity = match self.find_light() {
            Ok(Some(entity)) => entity,
            Ok(None) => {
                debug!(param, "no environment light yet; ignoring");
                return false;
            }
            Err(err) => {
                warn!(param, error = %err, "environment light lookup failed");
                return false;
            }
        };
        match self.host.set_param(&entity, param, value) {
            Ok(()) => {
                debug!(light = %entity, param, "light parameter set");
                true
            }
            Err(err) => {
                warn!(light = %entity, param, error = %err, "could not set light parameter");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SceneGraph;
    use std::path::PathBuf;

    fn bound() -> (Arc<SceneGraph>, EnvironmentLightBinding) {
        let light = LightOptions::default();
        let scene = Arc::new(SceneGraph::for_light(&light));
        let binding = EnvironmentLightBinding::new(scene.clone(), light, 5.0);
        (scene, binding)
    }

    #[test]
    fn multiplier_is_value_over_divisor() {
        assert_eq!(intensity_multiplier(0, 5.0), 0.0);
        assert_eq!(intensity_multiplier(5, 5.0), 1.0);
        assert_eq!(intensity_multiplier(10, 5.0), 2.0);
        assert_eq!(intensity_multiplier(100, 5.0), 20.0);
    }

    #[test]
    fn sliders_do_nothing_before_a_light_exists() {
        let (scene, binding) = bound();
        assert!(!binding.set_rotation(90));
        assert!(!binding.set_intensity(50));
        assert!(scene.children("/obj", None).is_empty());
    }

    #[test]
    fn select_creates_once_then_reuses() {
        let (scene, binding) = bound();
        assert!(binding.select_image(&PathBuf::from("/hdri/a.exr")));
        assert!(binding.select_image(&PathBuf::from("/hdri/b.hdr")));

        let lights = scene.children("/obj", Some("envlight"));
        assert_eq!(lights.len(), 1);
        assert_eq!(
            scene.param(&lights[0], "env_map"),
            Some(ParamValue::Str("/hdri/b.hdr".into()))
        );
    }

    #[test]
    fn sliders_write_exact_values_once_a_light_exists() {
        let (scene, binding) = bound();
        binding.select_image(&PathBuf::from("/hdri/a.exr"));
        let light = scene.children("/obj", Some("envlight")).remove(0);

        assert!(binding.set_rotation(-45));
        assert_eq!(scene.param(&light, "ry"), Some(ParamValue::Float(-45.0)));
        assert!(binding.set_rotation(1000));
        assert_eq!(scene.param(&light, "ry"), Some(ParamValue::Float(360.0)));

        assert!(binding.set_intensity(37));
        assert_eq!(
            scene.param(&light, "light_intensity"),
            Some(ParamValue::Float(37.0 / 5.0))
        );
    }

    #[test]
    fn host_failures_are_swallowed() {
        let binding =
            EnvironmentLightBinding::new(Arc::new(NoHost), LightOptions::default(), 5.0);
        assert!(!binding.select_image(&PathBuf::from("/hdri/a.exr")));
        assert!(!binding.set_rotation(10));
        assert!(!binding.set_intensity(10));

        // Light type without the map parameter: lookup works, set fails.
        let scene = Arc::new(SceneGraph::new("/obj"));
        let binding = EnvironmentLightBinding::new(scene.clone(), LightOptions::default(), 5.0);
        assert!(!binding.select_image(&PathBuf::from("/hdri/a.exr")));
        assert_eq!(scene.children("/obj", Some("envlight")).len(), 1);
    }

    #[test]
    fn disabled_integration_uses_no_host() {
        let cfg = Configuration {
            host_integration: false,
            ..Configuration::default()
        };
        let scene: Arc<dyn HostIntegration> = Arc::new(SceneGraph::for_light(&cfg.light));
        let binding = EnvironmentLightBinding::from_config(scene, &cfg);
        assert!(!binding.is_available());
    }
}
