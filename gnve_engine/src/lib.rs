/*!
# GNVE Engine

Core types and algorithms for the GNVE real-time renderer.

This crate is platform-agnostic: everything that talks to the GPU sits behind
a small set of traits implemented by a backend crate (Vulkan today). The
algorithms that matter for correctness (frame pacing, bindless registration,
scene import) live here and are testable without a device.

## Architecture

- **FrameLoop**: acquire → record → submit → present state machine over a [`frame::FrameBackend`]
- **TextureTable**: append-only bindless table over a [`bindless::DescriptorWriter`]
- **import_scene**: glTF import and texture transcoding over an [`asset::AssetUploader`]
- **Log**: logging port injected into every component
- **EngineConfig**: static configuration
*/

pub mod asset;
pub mod bindless;
pub mod config;
mod error;
pub mod frame;
pub mod log;

pub use error::{Error, Result};

// Main gnve namespace module
pub mod gnve {
    // Error types
    pub use crate::error::{Error, Result};

    pub use crate::config::EngineConfig;

    // Logging sub-module (types only, macros live at the crate root)
    pub mod log {
        pub use crate::log::{DefaultLogger, FanoutLogger, Log, LogEntry, LogSeverity, Logger, MemoryLogger};
    }

    // Frame loop sub-module
    pub mod frame {
        pub use crate::frame::*;
    }

    // Bindless sub-module
    pub mod bindless {
        pub use crate::bindless::*;
    }

    // Asset sub-module
    pub mod asset {
        pub use crate::asset::*;
    }
}

// Re-export math library at crate root
pub use glam;
