//! Scene import orchestration
//!
//! Runs to completion before the frame loop starts:
//!
//! 1. parse the document (fatal if absent or malformed)
//! 2. decode / transcode every embedded image
//! 3. grow the shared sampler LOD range once for the deepest mip chain, so
//!    every descriptor written below already references the final sampler
//! 4. upload each texture and register it in the bindless table
//! 5. build meshes (primitives merged, indices widened) and upload them

use std::path::Path;

use crate::bindless::TextureSlot;
use crate::error::Result;
use crate::log::Log;
use crate::{engine_debug, engine_error, engine_info};

use super::mesh::MeshData;
use super::scene::SceneDocument;
use super::texture::{decode_image, DecodedTexture};

const SOURCE: &str = "gnve::import";

/// GPU half of the import pipeline
pub trait AssetUploader {
    /// GPU-resident texture
    type Texture;
    /// GPU-resident vertex + index buffers
    type Mesh;

    /// Make sure the shared sampler can sample `mip_levels` levels
    fn ensure_sampler_lod(&mut self, mip_levels: u32) -> Result<()>;

    /// Staging copy of every mip level into a new device-local image
    fn upload_texture(&mut self, texture: &DecodedTexture) -> Result<Self::Texture>;

    /// Append to the bindless table
    fn register_texture(&mut self, texture: Self::Texture) -> Result<TextureSlot>;

    /// Staging copy of vertex and index data into device-local buffers
    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<Self::Mesh>;
}

/// A mesh after import: CPU data kept for inspection plus its GPU buffers
#[derive(Debug)]
pub struct ImportedMesh<M> {
    pub data: MeshData,
    pub gpu: M,
}

impl<M> ImportedMesh<M> {
    pub fn texture_slot(&self) -> TextureSlot {
        self.data.texture_slot
    }
}

/// Result of [`import_scene`]
#[derive(Debug)]
pub struct ImportedScene<M> {
    pub meshes: Vec<ImportedMesh<M>>,
    /// Slot assigned to each image, by image index
    pub texture_slots: Vec<TextureSlot>,
}

/// Open `path` and import it through `uploader`
pub fn import_scene_file<U>(path: impl AsRef<Path>, uploader: &mut U, log: &Log) -> Result<ImportedScene<U::Mesh>>
where
    U: AssetUploader + ?Sized,
{
    let path = path.as_ref();
    engine_info!(log, SOURCE, "Importing scene {}", path.display());
    let document = SceneDocument::open(path).inspect_err(|e| {
        engine_error!(log, SOURCE, "Failed to load {}: {}", path.display(), e);
    })?;
    import_scene(&document, uploader, log)
}

/// Decode, upload and register everything in `document`
pub fn import_scene<U>(document: &SceneDocument, uploader: &mut U, log: &Log) -> Result<ImportedScene<U::Mesh>>
where
    U: AssetUploader + ?Sized,
{
    let fail = |e: &crate::Error| engine_error!(log, SOURCE, "Scene import aborted: {}", e);

    let images = document.images().map_err(crate::Error::from).inspect_err(fail)?;
    let mut decoded = Vec::with_capacity(images.len());
    for image in &images {
        let texture = decode_image(image.index, image.mime, image.bytes)
            .map_err(crate::Error::from)
            .inspect_err(fail)?;
        engine_debug!(
            log,
            SOURCE,
            "Image {} ({}): {}x{} {:?}, {} mip level(s)",
            image.index,
            image.mime,
            texture.width,
            texture.height,
            texture.format,
            texture.mip_levels()
        );
        decoded.push(texture);
    }

    if let Some(deepest) = decoded.iter().map(DecodedTexture::mip_levels).max() {
        uploader.ensure_sampler_lod(deepest).inspect_err(fail)?;
    }

    let mut texture_slots = Vec::with_capacity(decoded.len());
    for texture in &decoded {
        let gpu = uploader.upload_texture(texture).inspect_err(fail)?;
        texture_slots.push(uploader.register_texture(gpu).inspect_err(fail)?);
    }

    let mesh_data = document.meshes(&texture_slots).map_err(crate::Error::from).inspect_err(fail)?;
    let mut meshes = Vec::with_capacity(mesh_data.len());
    for data in mesh_data {
        let gpu = uploader.upload_mesh(&data).inspect_err(fail)?;
        engine_debug!(
            log,
            SOURCE,
            "Mesh '{}': {} vertices, {} indices, {}",
            data.name,
            data.vertices.len(),
            data.indices.len(),
            data.texture_slot
        );
        meshes.push(ImportedMesh { data, gpu });
    }

    engine_info!(
        log,
        SOURCE,
        "Imported {} mesh(es), {} texture(s)",
        meshes.len(),
        texture_slots.len()
    );
    Ok(ImportedScene { meshes, texture_slots })
}

#[cfg(test)]
#[path = "import_tests.rs"]
mod tests;
