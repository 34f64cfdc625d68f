//! Bindless texture table bookkeeping
//!
//! The table owns every registered texture and hands out permanent slot
//! indices. Slots are assigned monotonically and never recycled, so a slot
//! index returned once is valid for the lifetime of the table and its
//! descriptor is never rewritten.
//!
//! The actual descriptor writes go through a [`DescriptorWriter`], which
//! holds one copy of the descriptor set per frame slot. A registration writes
//! the new entry into every copy, because any of them may be bound by a frame
//! still in flight.

use std::fmt;

use crate::error::{Error, Result};
use crate::frame::FrameSlotIndex;
use crate::log::Log;
use crate::{engine_debug, engine_error};

const SOURCE: &str = "gnve::bindless";

/// Permanent position of a texture in the bindless array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TextureSlot(u32);

impl TextureSlot {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Value pushed to the fragment shader as the texture index
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TextureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "texture slot {}", self.0)
    }
}

/// Backend side of the table: one descriptor-set copy per frame slot
pub trait DescriptorWriter<T> {
    /// Number of descriptor-set copies (= frames in flight)
    fn frame_copies(&self) -> usize;

    /// Write `texture` at `slot` of the copy owned by `copy`
    fn write_texture(&mut self, copy: FrameSlotIndex, slot: TextureSlot, texture: &T) -> Result<()>;
}

/// Fixed-capacity, append-only texture table
pub struct TextureTable<T> {
    capacity: u32,
    textures: Vec<T>,
    log: Log,
}

impl<T> TextureTable<T> {
    pub fn new(capacity: u32, log: Log) -> Self {
        Self {
            capacity,
            textures: Vec::new(),
            log,
        }
    }

    /// Register a texture at the next free slot
    ///
    /// Going past capacity is a configuration error: the descriptor array
    /// size is fixed at layout creation.
    pub fn register<W>(&mut self, writer: &mut W, texture: T) -> Result<TextureSlot>
    where
        W: DescriptorWriter<T> + ?Sized,
    {
        let used = self.used_count();
        if used >= self.capacity {
            engine_error!(
                self.log,
                SOURCE,
                "Texture table full: {} of {} slots used",
                used,
                self.capacity
            );
            return Err(Error::Configuration(format!(
                "bindless texture table capacity ({}) exceeded",
                self.capacity
            )));
        }

        let slot = TextureSlot::new(used);
        for copy in 0..writer.frame_copies() {
            writer.write_texture(FrameSlotIndex::new(copy), slot, &texture)?;
        }
        self.textures.push(texture);

        engine_debug!(self.log, SOURCE, "Registered {} ({} copies)", slot, writer.frame_copies());
        Ok(slot)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn used_count(&self) -> u32 {
        self.textures.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn get(&self, slot: TextureSlot) -> Option<&T> {
        self.textures.get(slot.get() as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureSlot, &T)> {
        self.textures
            .iter()
            .enumerate()
            .map(|(i, t)| (TextureSlot::new(i as u32), t))
    }

    /// Consume the table, yielding textures in slot order
    pub fn into_textures(self) -> Vec<T> {
        self.textures
    }
}

#[cfg(test)]
#[path = "texture_table_tests.rs"]
mod tests;
