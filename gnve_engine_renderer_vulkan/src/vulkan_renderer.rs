/// VulkanRenderer - ties the Vulkan pieces into a frame backend and an asset uploader
///
/// Construction order follows dependencies: instance and messenger, surface,
/// device, allocator context, swapchain, frame slots, sampler, bindless
/// descriptors, pipeline. Teardown runs in reverse through field order:
/// every GPU object holds an `Arc<GpuContext>` (device + allocator), and the
/// instance guard, declared last, outlives all of them.

use ash::vk;
use gnve_engine::gnve::asset::{import_scene_file, AssetUploader, DecodedTexture, MeshData};
use gnve_engine::gnve::bindless::{DescriptorWriter, SamplerLod, TextureSlot, TextureTable};
use gnve_engine::gnve::frame::{
    AcquireOutcome, Extent2D, FrameBackend, FrameSlotIndex, FrameStats, FrameUniforms, PresentOutcome,
    SwapImageIndex,
};
use gnve_engine::gnve::log::Log;
use gnve_engine::gnve::{EngineConfig, Error, Result};
use gnve_engine::{engine_bail, engine_debug, engine_error, engine_info, engine_warn};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CString;
use std::path::Path;
use std::sync::Arc;

use crate::debug::{DebugMessenger, ValidationStats, VALIDATION_LAYER};
use crate::vulkan_barrier::{record_transitions, ImageTransition};
use crate::vulkan_bindless::BindlessDescriptors;
use crate::vulkan_context::{vk_check, GpuContext};
use crate::vulkan_device::{create_logical_device, select_physical_device, DeviceSelection};
use crate::vulkan_frame::FrameSlot;
use crate::vulkan_overlay::{overlay_color_attachment, NullOverlay, OverlayFrame, OverlayPass};
use crate::vulkan_pipeline::ForwardPipeline;
use crate::vulkan_sampler::TextureSampler;
use crate::vulkan_swapchain::{has_stencil, Swapchain};
use crate::vulkan_texture::Texture;
use crate::vulkan_upload::{self, GpuMesh};

const SOURCE: &str = "gnve::vulkan::renderer";

/// What an import added to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneSummary {
    pub meshes: usize,
    pub textures: usize,
}

/// Instance-level objects, destroyed after everything created from them
struct InstanceOwner {
    instance: ash::Instance,
    messenger: Option<DebugMessenger>,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    // Unloads the Vulkan library when dropped, after the instance is gone
    _entry: ash::Entry,
}

impl Drop for InstanceOwner {
    fn drop(&mut self) {
        unsafe {
            if self.surface != vk::SurfaceKHR::null() {
                self.surface_loader.destroy_surface(self.surface, None);
            }
            if let Some(messenger) = self.messenger.take() {
                messenger.report();
            }
            self.instance.destroy_instance(None);
        }
    }
}

pub struct VulkanRenderer {
    overlay: Box<dyn OverlayPass>,
    meshes: Vec<GpuMesh>,
    pipeline: ForwardPipeline,
    textures: TextureTable<Texture>,
    descriptors: BindlessDescriptors,
    sampler: TextureSampler,
    sampler_lod: SamplerLod,
    frames: Vec<FrameSlot>,
    swapchain: Swapchain,
    ctx: Arc<GpuContext>,
    device_info: DeviceSelection,
    clear_color: [f32; 4],
    log: Log,
    // Must stay last
    instance: InstanceOwner,
}

impl VulkanRenderer {
    pub fn new<W>(window: &W, config: &EngineConfig, log: Log) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        config.validate().inspect_err(|e| engine_error!(log, SOURCE, "{}", e))?;

        let display_handle = window.display_handle().map_err(|e| {
            engine_error!(log, SOURCE, "Failed to get display handle: {}", e);
            Error::InitializationFailed(format!("failed to get display handle: {}", e))
        })?;
        let window_handle = window.window_handle().map_err(|e| {
            engine_error!(log, SOURCE, "Failed to get window handle: {}", e);
            Error::InitializationFailed(format!("failed to get window handle: {}", e))
        })?;

        let mut instance = Self::create_instance(config, display_handle.as_raw(), &log)?;

        instance.surface = vk_check(&log, "create window surface", unsafe {
            ash_window::create_surface(
                &instance._entry,
                &instance.instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
        })?;

        let device_info = select_physical_device(
            &instance.instance,
            &instance.surface_loader,
            instance.surface,
            config.max_textures,
            &log,
        )?;
        let ctx = Self::create_context(&instance.instance, &device_info, &log)?;

        let swapchain = Swapchain::create(
            &ctx,
            &instance.instance,
            device_info.physical_device,
            instance.surface_loader.clone(),
            instance.surface,
            Extent2D::new(config.width, config.height),
            config.min_image_count,
        )?;

        let frames = (0..config.frames_in_flight)
            .map(|index| FrameSlot::new(&ctx, index))
            .collect::<Result<Vec<_>>>()?;

        let sampler_lod = SamplerLod::new(config.initial_sampler_max_lod);
        let sampler = TextureSampler::new(&ctx, sampler_lod.max_lod(), Some(device_info.max_sampler_anisotropy))?;

        let mut descriptors = BindlessDescriptors::new(&ctx, frames.len(), config.max_textures, sampler.handle())?;
        for (index, frame) in frames.iter().enumerate() {
            descriptors.write_uniform(FrameSlotIndex::new(index), frame.uniform_buffer())?;
        }

        let pipeline = ForwardPipeline::new(
            &ctx,
            descriptors.layout(),
            swapchain.format(),
            swapchain.depth_format(),
            &config.vertex_shader,
            &config.fragment_shader,
        )?;

        engine_info!(
            log,
            SOURCE,
            "Renderer ready on '{}': {} frame(s) in flight, {} swapchain image(s), {} texture slot(s)",
            device_info.name,
            frames.len(),
            swapchain.image_count(),
            config.max_textures
        );

        Ok(Self {
            overlay: Box::new(NullOverlay),
            meshes: Vec::new(),
            pipeline,
            textures: TextureTable::new(config.max_textures, log.clone()),
            descriptors,
            sampler,
            sampler_lod,
            frames,
            swapchain,
            ctx,
            device_info,
            clear_color: config.clear_color,
            log,
            instance,
        })
    }

    fn create_instance(
        config: &EngineConfig,
        display: raw_window_handle::RawDisplayHandle,
        log: &Log,
    ) -> Result<InstanceOwner> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            engine_error!(log, SOURCE, "Failed to load Vulkan library: {}", e);
            Error::InitializationFailed(format!("failed to load Vulkan library: {}", e))
        })?;

        let app_name = CString::new(config.app_name.as_str())
            .map_err(|_| Error::Configuration("app_name must not contain NUL bytes".to_string()))?;
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"GNVE")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let mut extension_names = ash_window::enumerate_required_extensions(display)
            .map_err(|e| {
                engine_error!(log, SOURCE, "Failed to get required extensions: {}", e);
                Error::InitializationFailed(format!("failed to get required extensions: {}", e))
            })?
            .to_vec();

        let validation = config.enable_validation && Self::validation_available(&entry, log);
        if validation {
            extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
        }
        let layer_names = if validation { vec![VALIDATION_LAYER.as_ptr()] } else { Vec::new() };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);
        let instance = vk_check(log, "create Vulkan instance", unsafe { entry.create_instance(&create_info, None) })?;

        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
        let mut owner = InstanceOwner {
            instance,
            messenger: None,
            surface_loader,
            surface: vk::SurfaceKHR::null(),
            _entry: entry,
        };
        if validation {
            owner.messenger = Some(DebugMessenger::new(&owner._entry, &owner.instance, log, config.debug_severity)?);
        }
        Ok(owner)
    }

    fn validation_available(entry: &ash::Entry, log: &Log) -> bool {
        if !cfg!(feature = "vulkan-validation") {
            engine_warn!(log, SOURCE, "Validation requested but the `vulkan-validation` feature is off");
            return false;
        }
        let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
        let found = layers
            .iter()
            .any(|layer| layer.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER));
        if !found {
            engine_warn!(log, SOURCE, "{:?} is not installed, continuing without validation", VALIDATION_LAYER);
        }
        found
    }

    /// Device, queues, allocator and upload pool, owned by a shared context
    fn create_context(instance: &ash::Instance, selection: &DeviceSelection, log: &Log) -> Result<Arc<GpuContext>> {
        let device = create_logical_device(instance, selection, log)?;
        let destroy_device = |device: &ash::Device| unsafe { device.destroy_device(None) };

        let allocator = match Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device: selection.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        }) {
            Ok(allocator) => allocator,
            Err(e) => {
                engine_error!(log, SOURCE, "Failed to create GPU allocator: {:?}", e);
                destroy_device(&device);
                return Err(Error::InitializationFailed(format!("failed to create allocator: {:?}", e)));
            }
        };

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(selection.graphics_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let upload_pool = match vk_check(log, "create upload command pool", unsafe {
            device.create_command_pool(&pool_info, None)
        }) {
            Ok(pool) => pool,
            Err(e) => {
                drop(allocator);
                destroy_device(&device);
                return Err(e);
            }
        };

        let (graphics_queue, present_queue) = unsafe {
            (
                device.get_device_queue(selection.graphics_family, 0),
                device.get_device_queue(selection.present_family, 0),
            )
        };
        Ok(Arc::new(GpuContext::new(
            device,
            allocator,
            graphics_queue,
            selection.graphics_family,
            present_queue,
            upload_pool,
            log.clone(),
        )))
    }

    /// Import a glTF/GLB scene; its meshes are drawn from the next frame on
    ///
    /// Waits for the device first: uploads and a possible sampler rebuild
    /// must not overlap frames in flight.
    pub fn import_scene(&mut self, path: impl AsRef<Path>) -> Result<SceneSummary> {
        self.wait_idle()?;
        let log = self.log.clone();
        let textures_before = self.textures.used_count();
        let scene = import_scene_file(path, self, &log)?;

        let summary = SceneSummary {
            meshes: scene.meshes.len(),
            textures: scene.texture_slots.len(),
        };
        self.meshes.extend(scene.meshes.into_iter().map(|mesh| mesh.gpu));

        if self.textures.is_empty() {
            engine_debug!(self.log, SOURCE, "Scene has no images, registering a white fallback texture");
            let white = self.upload_texture(&DecodedTexture::solid([255, 255, 255, 255]))?;
            self.register_texture(white)?;
        }
        engine_debug!(
            self.log,
            SOURCE,
            "Texture table: {} -> {} of {} slot(s)",
            textures_before,
            self.textures.used_count(),
            self.textures.capacity()
        );
        Ok(summary)
    }

    /// Replace the overlay collaborator
    pub fn set_overlay(&mut self, overlay: Box<dyn OverlayPass>) {
        self.overlay = overlay;
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.ctx.check("wait for device idle", self.ctx.device.device_wait_idle()) }
    }

    pub fn device_name(&self) -> &str {
        &self.device_info.name
    }

    pub fn swapchain_image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    pub fn swapchain_format(&self) -> vk::Format {
        self.swapchain.format()
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.swapchain.present_mode()
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn texture_count(&self) -> u32 {
        self.textures.used_count()
    }

    pub fn sampler_max_lod(&self) -> f32 {
        self.sampler.max_lod()
    }

    /// Counters of the validation messenger, if validation is active
    pub fn validation_stats(&self) -> Option<ValidationStats> {
        self.instance.messenger.as_ref().map(DebugMessenger::stats)
    }

    fn frame(&self, slot: FrameSlotIndex) -> Result<&FrameSlot> {
        match self.frames.get(slot.get()) {
            Some(frame) => Ok(frame),
            None => engine_bail!(self.log, SOURCE, "{} out of range ({} frames in flight)", slot, self.frames.len()),
        }
    }

    /// Forward pass: one pipeline, one set, one push constant per mesh
    unsafe fn record_forward(
        &self,
        cmd: vk::CommandBuffer,
        slot: FrameSlotIndex,
        color_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<()> {
        let device = &self.ctx.device;
        let depth = self.swapchain.depth_target()?;

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(color_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            });
        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(depth.view())
            .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            });

        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let color_attachments = [color_attachment];
        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(render_area)
            .layer_count(1)
            .color_attachments(&color_attachments)
            .depth_attachment(&depth_attachment);
        if has_stencil(depth.format()) {
            rendering_info = rendering_info.stencil_attachment(&depth_attachment);
        }

        device.cmd_begin_rendering(cmd, &rendering_info);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        device.cmd_set_viewport(cmd, 0, &[viewport]);
        device.cmd_set_scissor(cmd, 0, &[render_area]);

        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.handle());
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            self.pipeline.layout(),
            0,
            &[self.descriptors.set(slot)?],
            &[],
        );

        for mesh in &self.meshes {
            device.cmd_bind_vertex_buffers(cmd, 0, &[mesh.vertex_buffer.handle()], &[0]);
            device.cmd_bind_index_buffer(cmd, mesh.index_buffer.handle(), 0, vk::IndexType::UINT32);
            device.cmd_push_constants(
                cmd,
                self.pipeline.layout(),
                vk::ShaderStageFlags::FRAGMENT,
                0,
                bytemuck::bytes_of(&mesh.texture_slot.get()),
            );
            device.cmd_draw_indexed(cmd, mesh.index_count, 1, 0, 0, 0);
        }

        device.cmd_end_rendering(cmd);
        Ok(())
    }

    /// Overlay pass: same color attachment, loaded, no depth
    unsafe fn record_overlay(
        &mut self,
        cmd: vk::CommandBuffer,
        slot: FrameSlotIndex,
        image: SwapImageIndex,
        color_view: vk::ImageView,
        extent: vk::Extent2D,
        stats: &FrameStats,
    ) -> Result<()> {
        let color_attachments = [overlay_color_attachment(color_view)];
        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments);

        self.ctx.device.cmd_begin_rendering(cmd, &rendering_info);
        let frame = OverlayFrame {
            device: &self.ctx.device,
            cmd,
            slot,
            image,
            extent,
            color_format: self.swapchain.format(),
            stats,
        };
        let result = self.overlay.record(&frame);
        // The scope is closed even if the overlay failed, so the buffer can still be ended
        self.ctx.device.cmd_end_rendering(cmd);
        result
    }
}

impl AssetUploader for VulkanRenderer {
    type Texture = Texture;
    type Mesh = GpuMesh;

    fn ensure_sampler_lod(&mut self, mip_levels: u32) -> Result<()> {
        let Some(max_lod) = self.sampler_lod.raise_for(mip_levels) else {
            return Ok(());
        };
        self.wait_idle()?;
        let sampler = self.sampler.rebuild(max_lod)?;
        self.descriptors.set_sampler(sampler);

        // Textures registered earlier switch to the new range as well
        for (slot, texture) in self.textures.iter() {
            for copy in 0..self.descriptors.frame_copies() {
                self.descriptors.write_texture(FrameSlotIndex::new(copy), slot, texture)?;
            }
        }
        Ok(())
    }

    fn upload_texture(&mut self, texture: &DecodedTexture) -> Result<Texture> {
        let name = format!("texture_{}", self.textures.used_count());
        vulkan_upload::upload_texture(&self.ctx, &name, texture)
    }

    fn register_texture(&mut self, texture: Texture) -> Result<TextureSlot> {
        self.textures.register(&mut self.descriptors, texture)
    }

    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<GpuMesh> {
        vulkan_upload::upload_mesh(&self.ctx, mesh)
    }
}

impl FrameBackend for VulkanRenderer {
    fn wait_frame_fence(&mut self, slot: FrameSlotIndex) -> Result<()> {
        self.frame(slot)?.wait()
    }

    fn reset_frame_fence(&mut self, slot: FrameSlotIndex) -> Result<()> {
        self.frame(slot)?.reset_fence()
    }

    fn acquire(&mut self, slot: FrameSlotIndex) -> Result<AcquireOutcome> {
        let semaphore = self.frame(slot)?.image_acquired;
        self.swapchain.acquire(semaphore)
    }

    fn update_uniforms(&mut self, slot: FrameSlotIndex, uniforms: &FrameUniforms) -> Result<()> {
        self.frame(slot)?.write_uniforms(uniforms)
    }

    fn record(&mut self, slot: FrameSlotIndex, image: SwapImageIndex, stats: &FrameStats) -> Result<()> {
        let cmd = self.frame(slot)?.command_buffer;
        let (color_image, color_view) = self.swapchain.color_target(image)?;
        let extent = self.swapchain.extent();
        let depth_image = self.swapchain.depth_target()?;
        let depth_barrier = ImageTransition::DepthToAttachment
            .barrier(depth_image.image(), 1)
            .subresource_range(depth_image.full_range());

        unsafe {
            let device = &self.ctx.device;
            self.ctx.check(
                "reset frame command buffer",
                device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty()),
            )?;
            let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.ctx.check("begin frame command buffer", device.begin_command_buffer(cmd, &begin_info))?;

            record_transitions(
                device,
                cmd,
                &[ImageTransition::ColorToAttachment.barrier(color_image, 1), depth_barrier],
            );

            self.record_forward(cmd, slot, color_view, extent)?;
            record_transitions(
                &self.ctx.device,
                cmd,
                &[ImageTransition::AttachmentToOverlay.barrier(color_image, 1)],
            );
            self.record_overlay(cmd, slot, image, color_view, extent, stats)?;

            let device = &self.ctx.device;
            record_transitions(device, cmd, &[ImageTransition::ColorToPresent.barrier(color_image, 1)]);
            self.ctx.check("end frame command buffer", device.end_command_buffer(cmd))
        }
    }

    fn submit(&mut self, slot: FrameSlotIndex, image: SwapImageIndex) -> Result<()> {
        let frame = self.frame(slot)?;
        let render_finished = self.swapchain.render_finished_semaphore(image)?;

        let wait_infos = [vk::SemaphoreSubmitInfo::default()
            .semaphore(frame.image_acquired)
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)];
        let signal_infos = [vk::SemaphoreSubmitInfo::default()
            .semaphore(render_finished)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        let command_infos = [vk::CommandBufferSubmitInfo::default().command_buffer(frame.command_buffer)];
        let submit_info = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait_infos)
            .command_buffer_infos(&command_infos)
            .signal_semaphore_infos(&signal_infos);

        unsafe {
            self.ctx.check(
                "submit frame",
                self.ctx
                    .device
                    .queue_submit2(self.ctx.graphics_queue, &[submit_info], frame.in_flight),
            )
        }
    }

    fn present(&mut self, image: SwapImageIndex) -> Result<PresentOutcome> {
        self.swapchain.present(self.ctx.present_queue, image)
    }

    fn rebuild_swapchain(&mut self, extent: Extent2D) -> Result<()> {
        let before = self.swapchain.image_count();
        self.swapchain.recreate(extent)?;
        engine_debug!(
            self.log,
            SOURCE,
            "Swapchain rebuilt at {}x{} ({} -> {} image(s))",
            extent.width,
            extent.height,
            before,
            self.swapchain.image_count()
        );
        Ok(())
    }

    fn swapchain_extent(&self) -> Extent2D {
        let extent = self.swapchain.extent();
        Extent2D::new(extent.width, extent.height)
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        // Fields drop in declaration order once nothing is in flight
        unsafe {
            self.ctx.device.device_wait_idle().ok();
        }
        self.sampler.shutdown();
        engine_info!(self.log, SOURCE, "Renderer shut down");
    }
}
