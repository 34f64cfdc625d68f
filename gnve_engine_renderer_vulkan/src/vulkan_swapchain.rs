/// Swapchain - presentable image chain, per-image views and the depth target
///
/// Owns everything whose lifetime is tied to the surface size:
/// - swapchain images and their views (always in lock-step)
/// - one render-finished semaphore per image (presentation is keyed by image index)
/// - the depth image shared by every frame in flight
///
/// A rebuild tears the whole state down before the new chain is created.

use ash::vk;
use gnve_engine::gnve::frame::{AcquireOutcome, Extent2D, PresentOutcome, SwapImageIndex};
use gnve_engine::gnve::{Error, Result};
use gnve_engine::{engine_bail, engine_debug, engine_error, engine_info};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_image::{GpuImage, ImageDesc};

const SOURCE: &str = "gnve::vulkan::swapchain";

/// Surface format the engine asks for first
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Depth formats tried in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Preferred format, else the first one the surface reports
pub fn negotiate_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|f| {
            f.format == PREFERRED_SURFACE_FORMAT.format && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .or_else(|| available.first())
        .copied()
}

/// MAILBOX when available, else FIFO (always supported)
pub fn negotiate_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Requested count clamped to the surface range (a max of 0 means unbounded)
pub fn negotiate_image_count(capabilities: &vk::SurfaceCapabilitiesKHR, requested: u32) -> u32 {
    let desired = requested.max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Fixed surface extent when the platform dictates one, else the window size clamped
pub fn clamp_extent(capabilities: &vk::SurfaceCapabilitiesKHR, window: Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: window.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: window.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// First candidate usable as an optimal-tiling depth attachment
pub fn find_depth_format<F>(properties: F) -> Option<vk::Format>
where
    F: Fn(vk::Format) -> vk::FormatProperties,
{
    DEPTH_FORMAT_CANDIDATES.into_iter().find(|&format| {
        properties(format)
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    })
}

/// Whether `format` carries a stencil aspect next to depth
pub fn has_stencil(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D16_UNORM_S8_UINT
    )
}

/// Aspects of a depth image of `format`
pub fn depth_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    if has_stencil(format) {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else {
        vk::ImageAspectFlags::DEPTH
    }
}

/// Vulkan swapchain manager
pub struct Swapchain {
    ctx: Arc<GpuContext>,
    physical_device: vk::PhysicalDevice,

    /// Surface, owned by the renderer's instance guard and outliving the swapchain
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,

    /// Swapchain
    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    /// One semaphore per swapchain image (signaled by submit, waited by present)
    render_finished: Vec<vk::Semaphore>,
    depth: Option<GpuImage>,

    /// Negotiated once at creation and kept across rebuilds
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    /// Resolved once by probing the device, then cached
    depth_format: vk::Format,
    /// Image count asked of the surface before clamping
    requested_image_count: u32,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Negotiate formats and build the first chain at `extent`
    pub fn create(
        ctx: &Arc<GpuContext>,
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        surface_loader: ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        extent: Extent2D,
        requested_image_count: u32,
    ) -> Result<Self> {
        let log = &ctx.log;
        let (formats, modes) = unsafe {
            let formats = ctx.check(
                "query surface formats",
                surface_loader.get_physical_device_surface_formats(physical_device, surface),
            )?;
            let modes = ctx.check(
                "query present modes",
                surface_loader.get_physical_device_surface_present_modes(physical_device, surface),
            )?;
            (formats, modes)
        };

        let surface_format = negotiate_surface_format(&formats).ok_or_else(|| {
            engine_error!(log, SOURCE, "Surface reports no formats");
            Error::Configuration("surface reports no formats".to_string())
        })?;
        let present_mode = negotiate_present_mode(&modes);
        let depth_format = find_depth_format(|format| unsafe {
            instance.get_physical_device_format_properties(physical_device, format)
        })
        .ok_or_else(|| {
            engine_error!(log, SOURCE, "No supported depth format among {:?}", DEPTH_FORMAT_CANDIDATES);
            Error::Configuration("no supported depth attachment format".to_string())
        })?;

        engine_info!(
            log,
            SOURCE,
            "Surface format {:?}/{:?}, present mode {:?}, depth {:?}",
            surface_format.format,
            surface_format.color_space,
            present_mode,
            depth_format
        );

        let mut swapchain = Self {
            ctx: Arc::clone(ctx),
            physical_device,
            surface,
            surface_loader,
            swapchain: vk::SwapchainKHR::null(),
            swapchain_loader: ash::khr::swapchain::Device::new(instance, &ctx.device),
            images: Vec::new(),
            image_views: Vec::new(),
            render_finished: Vec::new(),
            depth: None,
            surface_format,
            present_mode,
            depth_format,
            requested_image_count,
            extent: vk::Extent2D::default(),
        };
        swapchain.build(extent)?;
        Ok(swapchain)
    }

    /// Rebuild in dependency order: swapchain, image views, semaphores, depth
    fn build(&mut self, window_extent: Extent2D) -> Result<()> {
        if window_extent.is_zero() {
            engine_bail!(self.ctx.log, SOURCE, "Refusing to build a zero-extent swapchain");
        }

        let ctx = Arc::clone(&self.ctx);
        unsafe {
            let capabilities = ctx.check(
                "query surface capabilities",
                self.surface_loader
                    .get_physical_device_surface_capabilities(self.physical_device, self.surface),
            )?;
            let extent = clamp_extent(&capabilities, window_extent);
            if extent.width == 0 || extent.height == 0 {
                engine_bail!(ctx.log, SOURCE, "Surface reports a zero extent");
            }

            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(self.surface)
                .min_image_count(negotiate_image_count(&capabilities, self.requested_image_count))
                .image_format(self.surface_format.format)
                .image_color_space(self.surface_format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(self.present_mode)
                .clipped(true);

            self.swapchain = ctx.check("create swapchain", self.swapchain_loader.create_swapchain(&create_info, None))?;
            self.extent = extent;

            self.images = ctx.check("get swapchain images", self.swapchain_loader.get_swapchain_images(self.swapchain))?;

            for &image in &self.images {
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(self.surface_format.format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::IDENTITY,
                        g: vk::ComponentSwizzle::IDENTITY,
                        b: vk::ComponentSwizzle::IDENTITY,
                        a: vk::ComponentSwizzle::IDENTITY,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });
                let view = ctx.check("create swapchain image view", ctx.device.create_image_view(&view_info, None))?;
                self.image_views.push(view);
            }

            let semaphore_info = vk::SemaphoreCreateInfo::default();
            for _ in 0..self.images.len() {
                let semaphore = ctx.check(
                    "create render-finished semaphore",
                    ctx.device.create_semaphore(&semaphore_info, None),
                )?;
                self.render_finished.push(semaphore);
            }
        }

        self.depth = Some(GpuImage::new(
            &ctx,
            &ImageDesc {
                name: "depth_target",
                width: self.extent.width,
                height: self.extent.height,
                mip_levels: 1,
                format: self.depth_format,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                aspect: depth_aspect(self.depth_format),
            },
        )?);

        engine_debug!(
            ctx.log,
            SOURCE,
            "Swapchain built: {} image(s), {}x{}",
            self.images.len(),
            self.extent.width,
            self.extent.height
        );
        Ok(())
    }

    /// Release views, depth target and semaphores, then the swapchain handle
    pub fn destroy(&mut self) {
        unsafe {
            for view in self.image_views.drain(..) {
                self.ctx.device.destroy_image_view(view, None);
            }
            self.depth = None;
            for semaphore in self.render_finished.drain(..) {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
            self.images.clear();
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
                self.swapchain = vk::SwapchainKHR::null();
            }
        }
    }

    /// Wait for the device, tear everything down and build a new chain
    pub fn recreate(&mut self, extent: Extent2D) -> Result<()> {
        unsafe {
            self.ctx.check("wait idle before swapchain rebuild", self.ctx.device.device_wait_idle())?;
        }
        self.destroy();
        self.build(extent)
    }

    /// Acquire the next image, signaling `image_acquired`
    pub fn acquire(&self, image_acquired: vk::Semaphore) -> Result<AcquireOutcome> {
        let result = unsafe {
            self.swapchain_loader
                .acquire_next_image(self.swapchain, u64::MAX, image_acquired, vk::Fence::null())
        };
        match result {
            Ok((index, false)) => Ok(AcquireOutcome::Success(SwapImageIndex::new(index))),
            Ok((index, true)) => Ok(AcquireOutcome::Suboptimal(SwapImageIndex::new(index))),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => self.ctx.check("acquire swapchain image", Err(e)),
        }
    }

    /// Present `image`, waiting on its render-finished semaphore
    pub fn present(&self, queue: vk::Queue, image: SwapImageIndex) -> Result<PresentOutcome> {
        let semaphore = self.render_finished_semaphore(image)?;
        let swapchains = [self.swapchain];
        let image_indices = [image.get()];
        let wait_semaphores = [semaphore];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.swapchain_loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::Stale),
            Err(e) => self.ctx.check("present swapchain image", Err(e)),
        }
    }

    pub fn render_finished_semaphore(&self, image: SwapImageIndex) -> Result<vk::Semaphore> {
        match self.render_finished.get(image.as_usize()) {
            Some(&semaphore) => Ok(semaphore),
            None => engine_bail!(
                self.ctx.log,
                SOURCE,
                "{} out of range (count: {})",
                image,
                self.render_finished.len()
            ),
        }
    }

    /// (image, view) of a swapchain image
    pub fn color_target(&self, image: SwapImageIndex) -> Result<(vk::Image, vk::ImageView)> {
        match (self.images.get(image.as_usize()), self.image_views.get(image.as_usize())) {
            (Some(&image), Some(&view)) => Ok((image, view)),
            _ => engine_bail!(
                self.ctx.log,
                SOURCE,
                "{} out of range (count: {})",
                image,
                self.images.len()
            ),
        }
    }

    pub fn depth_target(&self) -> Result<&GpuImage> {
        match &self.depth {
            Some(depth) => Ok(depth),
            None => engine_bail!(self.ctx.log, SOURCE, "Depth target missing (swapchain destroyed)"),
        }
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            // Wait for device to finish
            self.ctx.device.device_wait_idle().ok();
        }
        self.destroy();
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
