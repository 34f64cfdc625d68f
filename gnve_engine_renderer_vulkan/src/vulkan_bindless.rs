/// BindlessDescriptors - the descriptor side of the bindless texture table
///
/// One descriptor set per frame in flight, all sharing a single layout:
/// - binding 0: uniform buffer (camera/model matrices), vertex stage
/// - binding 1: combined image sampler array of `capacity` entries,
///   variable count, partially bound, update-after-bind
///
/// Slot bookkeeping lives in [`gnve_engine::gnve::bindless::TextureTable`];
/// this type only writes descriptors into every frame's copy of the set.

use ash::vk;
use gnve_engine::gnve::bindless::{DescriptorWriter, TextureSlot};
use gnve_engine::gnve::frame::FrameSlotIndex;
use gnve_engine::gnve::Result;
use gnve_engine::{engine_bail, engine_debug};
use std::sync::Arc;

use crate::vulkan_buffer::GpuBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_texture::Texture;

const SOURCE: &str = "gnve::vulkan::bindless";

pub const UNIFORM_BINDING: u32 = 0;
pub const TEXTURE_BINDING: u32 = 1;

/// Flags of the texture array binding
pub fn texture_binding_flags() -> vk::DescriptorBindingFlags {
    vk::DescriptorBindingFlags::PARTIALLY_BOUND
        | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND
        | vk::DescriptorBindingFlags::UPDATE_UNUSED_WHILE_PENDING
        | vk::DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT
}

/// Layout bindings, in binding order
pub fn layout_bindings(capacity: u32) -> [vk::DescriptorSetLayoutBinding<'static>; 2] {
    [
        vk::DescriptorSetLayoutBinding::default()
            .binding(UNIFORM_BINDING)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX),
        vk::DescriptorSetLayoutBinding::default()
            .binding(TEXTURE_BINDING)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(capacity)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT),
    ]
}

/// Pool sizes for `frames` copies of the set
pub fn pool_sizes(frames: u32, capacity: u32) -> [vk::DescriptorPoolSize; 2] {
    [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: frames,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: frames * capacity,
        },
    ]
}

pub struct BindlessDescriptors {
    ctx: Arc<GpuContext>,
    layout: vk::DescriptorSetLayout,
    pool: vk::DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
    capacity: u32,
    /// Sampler embedded in descriptors written from now on
    sampler: vk::Sampler,
}

impl BindlessDescriptors {
    /// Create the layout, the pool and one set per frame in flight
    pub fn new(ctx: &Arc<GpuContext>, frames: usize, capacity: u32, sampler: vk::Sampler) -> Result<Self> {
        if frames == 0 || capacity == 0 {
            engine_bail!(
                ctx.log,
                SOURCE,
                "Bindless table needs at least one frame and one slot ({} frames, capacity {})",
                frames,
                capacity
            );
        }

        let mut this = Self {
            ctx: Arc::clone(ctx),
            layout: vk::DescriptorSetLayout::null(),
            pool: vk::DescriptorPool::null(),
            sets: Vec::new(),
            capacity,
            sampler,
        };

        unsafe {
            let bindings = layout_bindings(capacity);
            let binding_flags = [vk::DescriptorBindingFlags::empty(), texture_binding_flags()];
            let mut flags_info =
                vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);
            let layout_info = vk::DescriptorSetLayoutCreateInfo::default()
                .flags(vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
                .bindings(&bindings)
                .push_next(&mut flags_info);
            this.layout = ctx.check(
                "create bindless set layout",
                ctx.device.create_descriptor_set_layout(&layout_info, None),
            )?;

            let sizes = pool_sizes(frames as u32, capacity);
            let pool_info = vk::DescriptorPoolCreateInfo::default()
                .flags(vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND)
                .pool_sizes(&sizes)
                .max_sets(frames as u32);
            this.pool = ctx.check("create bindless pool", ctx.device.create_descriptor_pool(&pool_info, None))?;

            // Every copy requests the full capacity
            let layouts = vec![this.layout; frames];
            let counts = vec![capacity; frames];
            let mut variable_info =
                vk::DescriptorSetVariableDescriptorCountAllocateInfo::default().descriptor_counts(&counts);
            let alloc_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(this.pool)
                .set_layouts(&layouts)
                .push_next(&mut variable_info);
            this.sets = ctx.check("allocate bindless sets", ctx.device.allocate_descriptor_sets(&alloc_info))?;
        }

        engine_debug!(ctx.log, SOURCE, "Bindless table: {} set(s) x {} slot(s)", frames, capacity);
        Ok(this)
    }

    /// Point `copy`'s binding 0 at its frame's uniform buffer
    pub fn write_uniform(&mut self, copy: FrameSlotIndex, buffer: &GpuBuffer) -> Result<()> {
        let set = self.set(copy)?;
        let buffer_info = [vk::DescriptorBufferInfo {
            buffer: buffer.handle(),
            offset: 0,
            range: buffer.size(),
        }];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(UNIFORM_BINDING)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_info);
        unsafe {
            self.ctx.device.update_descriptor_sets(&[write], &[]);
        }
        Ok(())
    }

    /// Sampler used by every descriptor written after this call
    pub fn set_sampler(&mut self, sampler: vk::Sampler) {
        self.sampler = sampler;
    }

    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn set(&self, copy: FrameSlotIndex) -> Result<vk::DescriptorSet> {
        match self.sets.get(copy.get()) {
            Some(&set) => Ok(set),
            None => engine_bail!(
                self.ctx.log,
                SOURCE,
                "No descriptor set for {} ({} allocated)",
                copy,
                self.sets.len()
            ),
        }
    }
}

impl DescriptorWriter<Texture> for BindlessDescriptors {
    fn frame_copies(&self) -> usize {
        self.sets.len()
    }

    fn write_texture(&mut self, copy: FrameSlotIndex, slot: TextureSlot, texture: &Texture) -> Result<()> {
        if slot.get() >= self.capacity {
            engine_bail!(
                self.ctx.log,
                SOURCE,
                "{} is outside the descriptor array (capacity {})",
                slot,
                self.capacity
            );
        }
        let set = self.set(copy)?;
        let image_info = [vk::DescriptorImageInfo {
            sampler: self.sampler,
            image_view: texture.view(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(TEXTURE_BINDING)
            .dst_array_element(slot.get())
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_info);
        unsafe {
            self.ctx.device.update_descriptor_sets(&[write], &[]);
        }
        Ok(())
    }
}

impl Drop for BindlessDescriptors {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees its sets
            if self.pool != vk::DescriptorPool::null() {
                self.ctx.device.destroy_descriptor_pool(self.pool, None);
            }
            if self.layout != vk::DescriptorSetLayout::null() {
                self.ctx.device.destroy_descriptor_set_layout(self.layout, None);
            }
        }
    }
}
