//! Bindless texture table and the shared sampler LOD policy

pub mod sampler_lod;
pub mod texture_table;

pub use sampler_lod::SamplerLod;
pub use texture_table::{DescriptorWriter, TextureSlot, TextureTable};
