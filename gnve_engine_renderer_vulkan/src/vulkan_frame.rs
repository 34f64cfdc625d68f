/// FrameSlot - per-frame-in-flight command recording and synchronization
///
/// One slot per frame in flight. The CPU may touch a slot's command buffer,
/// uniform mapping or acquire semaphore only after its fence has signaled.

use ash::vk;
use gnve_engine::gnve::frame::FrameUniforms;
use gnve_engine::gnve::Result;
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use crate::vulkan_buffer::GpuBuffer;
use crate::vulkan_context::GpuContext;

pub struct FrameSlot {
    ctx: Arc<GpuContext>,
    command_pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,
    /// Signaled by acquire, waited by submit
    pub(crate) image_acquired: vk::Semaphore,
    /// Signaled when the slot's submission completes (created signaled)
    pub(crate) in_flight: vk::Fence,
    /// Persistently mapped camera/model matrices
    pub(crate) uniforms: GpuBuffer,
}

impl FrameSlot {
    pub fn new(ctx: &Arc<GpuContext>, index: usize) -> Result<Self> {
        let uniforms = GpuBuffer::new(
            ctx,
            &format!("frame_uniforms_{}", index),
            std::mem::size_of::<FrameUniforms>() as u64,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            MemoryLocation::CpuToGpu,
        )?;
        uniforms.write_pod(&FrameUniforms::default())?;

        let mut slot = Self {
            ctx: Arc::clone(ctx),
            command_pool: vk::CommandPool::null(),
            command_buffer: vk::CommandBuffer::null(),
            image_acquired: vk::Semaphore::null(),
            in_flight: vk::Fence::null(),
            uniforms,
        };

        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            slot.command_pool = ctx.check("create frame command pool", ctx.device.create_command_pool(&pool_info, None))?;

            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(slot.command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let buffers = ctx.check("allocate frame command buffer", ctx.device.allocate_command_buffers(&alloc_info))?;
            slot.command_buffer = buffers.first().copied().unwrap_or_default();

            slot.image_acquired = ctx.check(
                "create image-acquired semaphore",
                ctx.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None),
            )?;

            // Signaled so the very first wait on this slot returns immediately
            let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
            slot.in_flight = ctx.check("create in-flight fence", ctx.device.create_fence(&fence_info, None))?;
        }

        Ok(slot)
    }

    /// Block until the slot's previous submission has completed
    pub fn wait(&self) -> Result<()> {
        unsafe {
            self.ctx.check(
                "wait for frame fence",
                self.ctx.device.wait_for_fences(&[self.in_flight], true, u64::MAX),
            )
        }
    }

    pub fn reset_fence(&self) -> Result<()> {
        unsafe { self.ctx.check("reset frame fence", self.ctx.device.reset_fences(&[self.in_flight])) }
    }

    pub fn write_uniforms(&self, uniforms: &FrameUniforms) -> Result<()> {
        self.uniforms.write_pod(uniforms)
    }

    pub fn uniform_buffer(&self) -> &GpuBuffer {
        &self.uniforms
    }
}

impl Drop for FrameSlot {
    fn drop(&mut self) {
        unsafe {
            let device = &self.ctx.device;
            if self.in_flight != vk::Fence::null() {
                device.destroy_fence(self.in_flight, None);
            }
            if self.image_acquired != vk::Semaphore::null() {
                device.destroy_semaphore(self.image_acquired, None);
            }
            if self.command_pool != vk::CommandPool::null() {
                // Frees the command buffer with it
                device.destroy_command_pool(self.command_pool, None);
            }
        }
    }
}
