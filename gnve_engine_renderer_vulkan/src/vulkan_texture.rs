/// Texture - sampled GpuImage owned by the bindless table

use ash::vk;
use gnve_engine::gnve::asset::TextureFormat;

use crate::vulkan_image::GpuImage;

/// Sampled texture: a shader-read-only GpuImage plus its engine format
#[derive(Debug)]
pub struct Texture {
    pub(crate) image: GpuImage,
    pub(crate) format: TextureFormat,
}

impl Texture {
    pub fn new(image: GpuImage, format: TextureFormat) -> Self {
        Self { image, format }
    }

    /// View handed to the bindless descriptor
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.image.extent().width
    }

    pub fn height(&self) -> u32 {
        self.image.extent().height
    }

    pub fn mip_levels(&self) -> u32 {
        self.image.mip_levels()
    }
}

/// Convert TextureFormat to Vulkan format
pub fn format_to_vk(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::Bc1RgbaSrgb => vk::Format::BC1_RGBA_SRGB_BLOCK,
        TextureFormat::Bc1RgbaUnorm => vk::Format::BC1_RGBA_UNORM_BLOCK,
        TextureFormat::Bc3Srgb => vk::Format::BC3_SRGB_BLOCK,
        TextureFormat::Bc3Unorm => vk::Format::BC3_UNORM_BLOCK,
        TextureFormat::Bc5Unorm => vk::Format::BC5_UNORM_BLOCK,
        TextureFormat::Bc7Srgb => vk::Format::BC7_SRGB_BLOCK,
        TextureFormat::Bc7Unorm => vk::Format::BC7_UNORM_BLOCK,
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
