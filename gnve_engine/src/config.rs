//! Static engine configuration
//!
//! Everything here is fixed for the lifetime of a renderer. The demo binary
//! fills it from command-line flags; tests use `EngineConfig::default()`.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::log::LogSeverity;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Window title
    pub app_name: String,

    /// Initial window width in pixels
    pub width: u32,

    /// Initial window height in pixels
    pub height: u32,

    /// Number of frame slots (frames in flight), at least 1
    pub frames_in_flight: usize,

    /// Swapchain image count requested before clamping to the surface range
    pub min_image_count: u32,

    /// Bindless texture table capacity
    pub max_textures: u32,

    /// Enable validation layers and the debug messenger
    pub enable_validation: bool,

    /// Minimum severity of validation messages that are forwarded to the log
    pub debug_severity: LogSeverity,

    /// Max LOD of the shared sampler before any texture asks for more
    pub initial_sampler_max_lod: f32,

    /// RGBA clear color of the forward pass
    pub clear_color: [f32; 4],

    /// Vertex shader (SPIR-V, or GLSL with the `shaderc` feature)
    pub vertex_shader: PathBuf,

    /// Fragment shader (SPIR-V, or GLSL with the `shaderc` feature)
    pub fragment_shader: PathBuf,

    /// Minimum severity of engine log messages
    pub log_level: LogSeverity,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_name: "GNVE".to_string(),
            width: 1280,
            height: 720,
            frames_in_flight: 2,
            min_image_count: 2,
            max_textures: 1024,
            enable_validation: cfg!(debug_assertions),
            debug_severity: LogSeverity::Warn,
            initial_sampler_max_lod: 1.0,
            clear_color: [0.05, 0.05, 0.08, 1.0],
            vertex_shader: PathBuf::from("shaders/mesh.vert.spv"),
            fragment_shader: PathBuf::from("shaders/mesh.frag.spv"),
            log_level: LogSeverity::Info,
        }
    }
}

impl EngineConfig {
    /// Reject configurations no renderer can be built from
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(Error::Configuration(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.min_image_count == 0 {
            return Err(Error::Configuration(
                "min_image_count must be at least 1".to_string(),
            ));
        }
        if self.max_textures == 0 {
            return Err(Error::Configuration(
                "max_textures must be at least 1".to_string(),
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::Configuration(format!(
                "initial window size must be non-zero (got {}x{})",
                self.width, self.height
            )));
        }
        if !(self.initial_sampler_max_lod >= 0.0) {
            return Err(Error::Configuration(format!(
                "initial_sampler_max_lod must be >= 0 (got {})",
                self.initial_sampler_max_lod
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.max_textures, 1024);
        assert_eq!(config.min_image_count, 2);
    }

    #[test]
    fn test_zero_image_count_rejected() {
        let config = EngineConfig {
            min_image_count: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_zero_frames_in_flight_rejected() {
        let config = EngineConfig {
            frames_in_flight: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_zero_texture_capacity_rejected() {
        let config = EngineConfig {
            max_textures: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_nan_lod_rejected() {
        let config = EngineConfig {
            initial_sampler_max_lod: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
