/// GpuBuffer - device buffer + backing memory + optional persistent mapping

use ash::vk;
use gnve_engine::gnve::Result;
use gnve_engine::engine_bail;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

const SOURCE: &str = "gnve::vulkan::buffer";

/// Vulkan buffer owned by exactly one higher-level object
///
/// Host-visible buffers (`MemoryLocation::CpuToGpu`) stay mapped for their
/// whole lifetime; `write` copies straight into that mapping.
pub struct GpuBuffer {
    /// Shared GPU context (device, allocator, queue, command pool)
    ctx: Arc<GpuContext>,
    /// Vulkan buffer
    pub(crate) buffer: vk::Buffer,
    /// GPU memory allocation
    pub(crate) allocation: Option<Allocation>,
    /// Buffer size in bytes
    pub(crate) size: u64,
}

impl GpuBuffer {
    /// Create a buffer and bind freshly allocated memory to it
    pub fn new(
        ctx: &Arc<GpuContext>,
        name: &str,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> Result<Self> {
        if size == 0 {
            engine_bail!(ctx.log, SOURCE, "Refusing to create zero-sized buffer '{}'", name);
        }

        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx.check("create buffer", ctx.device.create_buffer(&create_info, None))?;
            let requirements = ctx.device.get_buffer_memory_requirements(buffer);

            let allocation = ctx
                .lock_allocator()
                .and_then(|mut allocator| {
                    allocator
                        .allocate(&AllocationCreateDesc {
                            name,
                            requirements,
                            location,
                            linear: true,
                            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                        })
                        .map_err(|e| ctx.allocation_error(name, e))
                })
                .inspect_err(|_| ctx.device.destroy_buffer(buffer, None))?;

            let bound = ctx.check(
                "bind buffer memory",
                ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()),
            );
            // Built before checking the bind so Drop releases both on failure
            let this = Self {
                ctx: Arc::clone(ctx),
                buffer,
                allocation: Some(allocation),
                size,
            };
            bound.map(|()| this)
        }
    }

    /// Copy `data` into the persistent mapping at `offset`
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            engine_bail!(
                self.ctx.log,
                SOURCE,
                "Buffer write out of range: offset {} + {} bytes > size {}",
                offset,
                data.len(),
                self.size
            );
        }

        let Some(allocation) = &self.allocation else {
            engine_bail!(self.ctx.log, SOURCE, "Buffer write failed: no GPU allocation");
        };
        let Some(mapped) = allocation.mapped_ptr() else {
            engine_bail!(self.ctx.log, SOURCE, "Buffer write failed: buffer is not CPU-accessible");
        };

        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                (mapped.as_ptr() as *mut u8).add(offset as usize),
                data.len(),
            );
        }
        Ok(())
    }

    /// Write a plain-old-data value at offset 0
    pub fn write_pod<T: bytemuck::Pod>(&self, value: &T) -> Result<()> {
        self.write(0, bytemuck::bytes_of(value))
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_mapped(&self) -> bool {
        self.allocation
            .as_ref()
            .is_some_and(|allocation| allocation.mapped_ptr().is_some())
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        unsafe {
            // Free GPU memory
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if lock fails - we still need to destroy the buffer
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }

            // Destroy buffer
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("buffer", &self.buffer)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
