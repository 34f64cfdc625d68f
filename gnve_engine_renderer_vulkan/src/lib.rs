/*!
# GNVE Engine - Vulkan Backend

Vulkan implementation of the GNVE core traits, built on `ash` (Vulkan 1.3
dynamic rendering + synchronization2) and `gpu-allocator`.

[`VulkanRenderer`] implements both halves the core drives:
- [`gnve_engine::gnve::frame::FrameBackend`] for the frame loop
- [`gnve_engine::gnve::asset::AssetUploader`] for scene import

```no_run
use gnve_engine::gnve::log::{Log, LogSeverity};
use gnve_engine::gnve::EngineConfig;
use gnve_engine_renderer_vulkan::VulkanRenderer;

# fn run(window: &winit::window::Window) -> gnve_engine::gnve::Result<()> {
let config = EngineConfig::default();
let mut renderer = VulkanRenderer::new(window, &config, Log::console(LogSeverity::Info))?;
renderer.import_scene("assets/scene.glb")?;
# Ok(())
# }
```
*/

mod debug;
mod vulkan_barrier;
mod vulkan_bindless;
mod vulkan_buffer;
mod vulkan_context;
mod vulkan_device;
mod vulkan_frame;
mod vulkan_image;
mod vulkan_overlay;
mod vulkan_pipeline;
mod vulkan_renderer;
mod vulkan_sampler;
mod vulkan_shader;
mod vulkan_swapchain;
mod vulkan_texture;
mod vulkan_upload;

pub use debug::ValidationStats;
pub use vulkan_overlay::{NullOverlay, OverlayFrame, OverlayPass};
pub use vulkan_renderer::{SceneSummary, VulkanRenderer};
pub use vulkan_texture::Texture;
pub use vulkan_upload::GpuMesh;

// Vulkan types appear in the overlay interface
pub use ash;
