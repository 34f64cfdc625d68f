/// GpuContext - Shared GPU resources for all Vulkan objects
///
/// Contains everything needed for GPU operations:
/// - Device for Vulkan API calls
/// - Allocator for memory management
/// - Queue for command submission
/// - Command pool for one-shot upload operations
/// - Log port for error reporting

use ash::prelude::VkResult;
use ash::vk;
use gnve_engine::engine_error;
use gnve_engine::gnve::log::Log;
use gnve_engine::gnve::{Error, Result};
use gpu_allocator::vulkan::Allocator;
use gpu_allocator::AllocationError;
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};

const SOURCE: &str = "gnve::vulkan";

/// Shared GPU context for all Vulkan resources.
///
/// Every GPU resource (buffers, images, frame slots, descriptors) holds an
/// `Arc<GpuContext>`, so the device is destroyed only after the last resource
/// referencing it has been released.
pub struct GpuContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop so it is dropped BEFORE the device is destroyed
    pub allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Graphics queue for command submission
    pub graphics_queue: vk::Queue,

    /// Graphics queue family index
    pub graphics_queue_family: u32,

    /// Present queue (may be the graphics queue)
    pub present_queue: vk::Queue,

    /// Reusable command pool for one-shot upload operations
    /// (created with TRANSIENT + RESET_COMMAND_BUFFER flags)
    pub upload_command_pool: Mutex<vk::CommandPool>,

    /// Log port shared by every resource
    pub log: Log,
}

impl GpuContext {
    /// Create a new GPU context
    ///
    /// # Arguments
    ///
    /// * `device` - Vulkan logical device
    /// * `allocator` - GPU memory allocator
    /// * `graphics_queue` - Graphics queue for command submission
    /// * `graphics_queue_family` - Graphics queue family index
    /// * `present_queue` - Queue used for presentation
    /// * `upload_command_pool` - Command pool for upload operations
    /// * `log` - Log port
    pub fn new(
        device: ash::Device,
        allocator: Allocator,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
        present_queue: vk::Queue,
        upload_command_pool: vk::CommandPool,
        log: Log,
    ) -> Self {
        Self {
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            graphics_queue_family,
            present_queue,
            upload_command_pool: Mutex::new(upload_command_pool),
            log,
        }
    }

    /// Map a Vulkan result to `Error::Device`, logging the numeric code
    pub fn check<T>(&self, context: &str, result: VkResult<T>) -> Result<T> {
        vk_check(&self.log, context, result)
    }

    /// Lock the allocator; a poisoned lock is reported as an invalid resource
    pub fn lock_allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        self.allocator.lock().map_err(|_| {
            engine_error!(self.log, SOURCE, "GPU allocator lock poisoned");
            Error::InvalidResource("GPU allocator lock poisoned".to_string())
        })
    }

    /// Map an allocation failure, keeping out-of-memory distinguishable
    pub fn allocation_error(&self, what: &str, err: AllocationError) -> Error {
        engine_error!(self.log, SOURCE, "Failed to allocate memory for {}: {:?}", what, err);
        match err {
            AllocationError::OutOfMemory => Error::OutOfMemory,
            other => Error::InvalidResource(format!("allocation for {} failed: {:?}", what, other)),
        }
    }
}

/// Map a Vulkan result to `Error::Device`, logging the numeric code
pub fn vk_check<T>(log: &Log, context: &str, result: VkResult<T>) -> Result<T> {
    result.map_err(|code| {
        engine_error!(log, SOURCE, "Failed to {}: {:?} (code {})", context, code, code.as_raw());
        Error::Device {
            context: context.to_string(),
            code: code.as_raw(),
        }
    })
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            if let Ok(pool) = self.upload_command_pool.get_mut() {
                if *pool != vk::CommandPool::null() {
                    self.device.destroy_command_pool(*pool, None);
                    *pool = vk::CommandPool::null();
                }
            }

            // Free VkDeviceMemory pages before the device goes away
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
        }
    }
}
