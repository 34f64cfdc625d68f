/// Max-LOD policy of the sampler shared by every bindless texture
///
/// The range only grows. When a texture arrives with more mip levels than
/// the current range covers, [`SamplerLod::raise_for`] returns the new max LOD
/// and the backend builds a new sampler for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerLod {
    max_lod: f32,
}

impl SamplerLod {
    pub fn new(initial_max_lod: f32) -> Self {
        Self {
            max_lod: initial_max_lod.max(0.0),
        }
    }

    /// Max LOD that samples every level of a `mip_levels` chain
    pub fn required_max_lod(mip_levels: u32) -> f32 {
        mip_levels.max(1) as f32
    }

    pub fn max_lod(&self) -> f32 {
        self.max_lod
    }

    /// Grow the range to cover `mip_levels`; `Some(new_max)` means rebuild
    pub fn raise_for(&mut self, mip_levels: u32) -> Option<f32> {
        let required = Self::required_max_lod(mip_levels);
        if required > self.max_lod {
            self.max_lod = required;
            Some(required)
        } else {
            None
        }
    }
}
