/// GpuImage - device image + backing memory + view

use ash::vk;
use gnve_engine::gnve::Result;
use gnve_engine::engine_bail;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

const SOURCE: &str = "gnve::vulkan::image";

/// Creation parameters for a 2D [`GpuImage`]
#[derive(Debug, Clone, Copy)]
pub struct ImageDesc<'a> {
    pub name: &'a str,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
    pub aspect: vk::ImageAspectFlags,
}

/// Device-local 2D image with one view over all of its mip levels
pub struct GpuImage {
    ctx: Arc<GpuContext>,
    /// Vulkan image
    pub(crate) image: vk::Image,
    /// Vulkan image view
    pub(crate) view: vk::ImageView,
    /// GPU memory allocation
    pub(crate) allocation: Option<Allocation>,
    pub(crate) format: vk::Format,
    pub(crate) extent: vk::Extent2D,
    pub(crate) mip_levels: u32,
    pub(crate) aspect: vk::ImageAspectFlags,
}

impl GpuImage {
    pub fn new(ctx: &Arc<GpuContext>, desc: &ImageDesc<'_>) -> Result<Self> {
        if desc.width == 0 || desc.height == 0 || desc.mip_levels == 0 {
            engine_bail!(
                ctx.log,
                SOURCE,
                "Invalid image '{}': {}x{} with {} mip level(s)",
                desc.name,
                desc.width,
                desc.height,
                desc.mip_levels
            );
        }

        unsafe {
            let image_create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(desc.format)
                .extent(vk::Extent3D {
                    width: desc.width,
                    height: desc.height,
                    depth: 1,
                })
                .mip_levels(desc.mip_levels)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(desc.usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx.check("create image", ctx.device.create_image(&image_create_info, None))?;
            let requirements = ctx.device.get_image_memory_requirements(image);

            let allocation = ctx
                .lock_allocator()
                .and_then(|mut allocator| {
                    allocator
                        .allocate(&AllocationCreateDesc {
                            name: desc.name,
                            requirements,
                            location: MemoryLocation::GpuOnly,
                            linear: false,
                            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                        })
                        .map_err(|e| {
                            let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                            ctx.allocation_error(&format!("image '{}' ({:.2} MB)", desc.name, size_mb), e)
                        })
                })
                .inspect_err(|_| ctx.device.destroy_image(image, None))?;

            // Built early so Drop cleans up whatever was created if a later step fails
            let mut this = Self {
                ctx: Arc::clone(ctx),
                image,
                view: vk::ImageView::null(),
                allocation: Some(allocation),
                format: desc.format,
                extent: vk::Extent2D {
                    width: desc.width,
                    height: desc.height,
                },
                mip_levels: desc.mip_levels,
                aspect: desc.aspect,
            };

            if let Some(allocation) = &this.allocation {
                ctx.check(
                    "bind image memory",
                    ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()),
                )?;
            }

            let view_create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(desc.format)
                .subresource_range(this.full_range());
            this.view = ctx.check("create image view", ctx.device.create_image_view(&view_create_info, None))?;

            Ok(this)
        }
    }

    /// Subresource range covering every mip level
    pub fn full_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect,
            base_mip_level: 0,
            level_count: self.mip_levels,
            base_array_layer: 0,
            layer_count: 1,
        }
    }

    pub fn image(&self) -> vk::Image {
        self.image
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        unsafe {
            // Destroy image view
            if self.view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.view, None);
            }

            // Free GPU memory
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }

            // Destroy image
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}

impl std::fmt::Debug for GpuImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuImage")
            .field("image", &self.image)
            .field("format", &self.format)
            .field("extent", &self.extent)
            .field("mip_levels", &self.mip_levels)
            .finish_non_exhaustive()
    }
}
