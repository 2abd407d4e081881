use crate::assets::ParseMode;
use crate::render::CameraSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Mesh Viewer".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub base_speed: f32,
    pub mouse_sensitivity: f32,
    pub speed_multipliers: Vec<f32>,
    pub fov_degrees: f32,
    pub near_plane: f32,
    pub far_plane_scale: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let settings = CameraSettings::default();
        Self {
            base_speed: settings.base_speed,
            mouse_sensitivity: settings.mouse_sensitivity,
            speed_multipliers: vec![1.0, 5.0, 10.0, 20.0, 40.0],
            fov_degrees: settings.fov_degrees,
            near_plane: settings.near_plane,
            far_plane_scale: settings.far_plane_scale,
        }
    }
}

impl CameraConfig {
    pub fn settings(&self) -> CameraSettings {
        CameraSettings {
            base_speed: self.base_speed,
            mouse_sensitivity: self.mouse_sensitivity,
            fov_degrees: self.fov_degrees,
            near_plane: self.near_plane,
            far_plane_scale: self.far_plane_scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub clear_color: [f64; 4],
    pub solid_color: [f32; 3],
    pub wireframe_color: [f32; 3],
    pub msaa_samples: u32,
    pub cull_back_faces: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.2, 0.2, 0.2, 1.0],
            solid_color: [0.5, 0.7, 1.0],
            wireframe_color: [0.0, 0.0, 0.0],
            msaa_samples: 4,
            cull_back_faces: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub render: RenderConfig,
    pub target_fps: f32,
    pub parse_mode: ParseMode,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            camera: CameraConfig::default(),
            render: RenderConfig::default(),
            target_fps: 60.0,
            parse_mode: ParseMode::Lenient,
        }
    }
}

impl ViewerConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(invalid("window", "width and height must be non-zero"));
        }
        if !(self.target_fps > 0.0) {
            return Err(invalid("target_fps", "must be positive"));
        }
        if !(self.camera.base_speed > 0.0) {
            return Err(invalid("camera.base_speed", "must be positive"));
        }
        if self.camera.speed_multipliers.is_empty() {
            return Err(invalid("camera.speed_multipliers", "must not be empty"));
        }
        if self.camera.speed_multipliers.iter().any(|m| !(*m > 0.0)) {
            return Err(invalid("camera.speed_multipliers", "entries must be positive"));
        }
        if !(self.camera.fov_degrees > 0.0 && self.camera.fov_degrees < 180.0) {
            return Err(invalid("camera.fov_degrees", "must be within (0, 180)"));
        }
        if !(self.camera.near_plane > 0.0) {
            return Err(invalid("camera.near_plane", "must be positive"));
        }
        if !(self.camera.far_plane_scale > 0.0) {
            return Err(invalid("camera.far_plane_scale", "must be positive"));
        }
        if !matches!(self.render.msaa_samples, 1 | 4) {
            return Err(invalid(
                "render.msaa_samples",
                format!("{} (supported: 1, 4)", self.render.msaa_samples),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_reference_viewer() {
        let config = ViewerConfig::default();
        assert_eq!(config.camera.speed_multipliers, vec![1.0, 5.0, 10.0, 20.0, 40.0]);
        assert_eq!(config.camera.base_speed, 100.0);
        assert_eq!(config.target_fps, 60.0);
        assert_eq!(config.parse_mode, ParseMode::Lenient);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = ViewerConfig::from_json(
            r#"{ "camera": { "base_speed": 25.0 }, "parse_mode": "strict" }"#,
        )
        .unwrap();
        assert_eq!(config.camera.base_speed, 25.0);
        assert_eq!(config.camera.mouse_sensitivity, 0.1);
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.parse_mode, ParseMode::Strict);
    }

    #[test]
    fn empty_multiplier_list_is_rejected() {
        let err = ViewerConfig::from_json(r#"{ "camera": { "speed_multipliers": [] } }"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "camera.speed_multipliers",
                ..
            }
        ));
    }

    #[test]
    fn unsupported_msaa_is_rejected() {
        let err = ViewerConfig::from_json(r#"{ "render": { "msaa_samples": 3 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            ViewerConfig::from_json("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn round_trips_through_file() {
        let mut config = ViewerConfig::default();
        config.target_fps = 30.0;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string_pretty(&config).unwrap().as_bytes())
            .unwrap();

        let loaded = ViewerConfig::load_from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }
}
