/// TextureSampler - the single VkSampler shared by every bindless texture
///
/// The max LOD only grows. A rebuild creates a new sampler and retires the
/// old one instead of destroying it: descriptors written earlier still embed
/// the old handle and may be bound by frames in flight, so retired samplers
/// live until shutdown.

use ash::vk;
use gnve_engine::gnve::Result;
use gnve_engine::engine_info;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

const SOURCE: &str = "gnve::vulkan::sampler";

/// Create info for the shared trilinear, repeating sampler
pub fn sampler_create_info(max_lod: f32, max_anisotropy: Option<f32>) -> vk::SamplerCreateInfo<'static> {
    let create_info = vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(max_lod.max(0.0))
        .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS);

    match max_anisotropy {
        Some(max_aniso) if max_aniso > 1.0 => create_info.anisotropy_enable(true).max_anisotropy(max_aniso),
        _ => create_info.anisotropy_enable(false).max_anisotropy(1.0),
    }
}

pub struct TextureSampler {
    ctx: Option<Arc<GpuContext>>,
    current: vk::Sampler,
    max_lod: f32,
    max_anisotropy: Option<f32>,
    retired: Vec<vk::Sampler>,
}

impl TextureSampler {
    pub fn new(ctx: &Arc<GpuContext>, max_lod: f32, max_anisotropy: Option<f32>) -> Result<Self> {
        let current = Self::create_vk_sampler(ctx, max_lod, max_anisotropy)?;
        Ok(Self {
            ctx: Some(Arc::clone(ctx)),
            current,
            max_lod,
            max_anisotropy,
            retired: Vec::new(),
        })
    }

    /// Replace the sampler with one covering `max_lod`; the old one is retired
    pub fn rebuild(&mut self, max_lod: f32) -> Result<vk::Sampler> {
        let Some(ctx) = &self.ctx else {
            return Err(gnve_engine::gnve::Error::InvalidResource(
                "TextureSampler used after shutdown".to_string(),
            ));
        };
        let sampler = Self::create_vk_sampler(ctx, max_lod, self.max_anisotropy)?;
        engine_info!(
            ctx.log,
            SOURCE,
            "Sampler max LOD {} -> {} ({} retired)",
            self.max_lod,
            max_lod,
            self.retired.len() + 1
        );
        self.retired.push(std::mem::replace(&mut self.current, sampler));
        self.max_lod = max_lod;
        Ok(sampler)
    }

    pub fn handle(&self) -> vk::Sampler {
        self.current
    }

    pub fn max_lod(&self) -> f32 {
        self.max_lod
    }

    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    /// Destroy the live and retired samplers and release the context.
    /// Must be called while the device is idle.
    pub fn shutdown(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            unsafe {
                for sampler in self.retired.drain(..) {
                    ctx.device.destroy_sampler(sampler, None);
                }
                ctx.device.destroy_sampler(self.current, None);
            }
            self.current = vk::Sampler::null();
        }
    }

    fn create_vk_sampler(ctx: &GpuContext, max_lod: f32, max_anisotropy: Option<f32>) -> Result<vk::Sampler> {
        let create_info = sampler_create_info(max_lod, max_anisotropy);
        unsafe { ctx.check("create sampler", ctx.device.create_sampler(&create_info, None)) }
    }
}

impl Drop for TextureSampler {
    fn drop(&mut self) {
        // No-op once shutdown() ran
        self.shutdown();
    }
}
