/// Staging uploads into device-local memory
///
/// Every upload follows the same pattern: a transient host-visible staging
/// buffer, a one-shot command buffer from the shared upload pool, and a
/// blocking wait for completion. The staging buffer is released as soon as
/// the copy has finished.

use ash::vk;
use gnve_engine::gnve::asset::{DecodedTexture, MeshData};
use gnve_engine::gnve::bindless::TextureSlot;
use gnve_engine::gnve::Result;
use gnve_engine::{engine_bail, engine_trace};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use crate::vulkan_barrier::{record_transitions, ImageTransition};
use crate::vulkan_buffer::GpuBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_image::{GpuImage, ImageDesc};
use crate::vulkan_texture::{format_to_vk, Texture};

const SOURCE: &str = "gnve::vulkan::upload";

/// Vertex + index buffers of one imported mesh
#[derive(Debug)]
pub struct GpuMesh {
    pub vertex_buffer: GpuBuffer,
    pub index_buffer: GpuBuffer,
    pub index_count: u32,
    pub texture_slot: TextureSlot,
}

/// Record `record` into a one-shot command buffer, submit it and wait
pub fn one_shot<F>(ctx: &GpuContext, what: &str, record: F) -> Result<()>
where
    F: FnOnce(vk::CommandBuffer),
{
    let pool = ctx.upload_command_pool.lock().map_err(|_| {
        gnve_engine::engine_err!(ctx.log, SOURCE, "Upload command pool lock poisoned ({})", what)
    })?;

    unsafe {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(*pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let cmd = ctx
            .check("allocate upload command buffer", ctx.device.allocate_command_buffers(&alloc_info))?
            .into_iter()
            .next()
            .ok_or_else(|| gnve_engine::engine_err!(ctx.log, SOURCE, "Driver returned no command buffer"))?;

        let result = (|| {
            let begin_info =
                vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            ctx.check("begin upload command buffer", ctx.device.begin_command_buffer(cmd, &begin_info))?;

            record(cmd);

            ctx.check("end upload command buffer", ctx.device.end_command_buffer(cmd))?;

            let command_buffers = [cmd];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            ctx.check(
                "submit upload",
                ctx.device.queue_submit(ctx.graphics_queue, &[submit_info], vk::Fence::null()),
            )?;
            ctx.check("wait for upload", ctx.device.queue_wait_idle(ctx.graphics_queue))
        })();

        ctx.device.free_command_buffers(*pool, &[cmd]);
        engine_trace!(ctx.log, SOURCE, "One-shot upload '{}' finished", what);
        result
    }
}

/// Host-visible buffer pre-filled with `bytes`
fn staging_buffer(ctx: &Arc<GpuContext>, name: &str, bytes: &[u8]) -> Result<GpuBuffer> {
    let staging = GpuBuffer::new(
        ctx,
        name,
        bytes.len() as u64,
        vk::BufferUsageFlags::TRANSFER_SRC,
        MemoryLocation::CpuToGpu,
    )?;
    staging.write(0, bytes)?;
    Ok(staging)
}

/// Copy `bytes` into a new device-local buffer with `usage`
pub fn upload_buffer(
    ctx: &Arc<GpuContext>,
    name: &str,
    bytes: &[u8],
    usage: vk::BufferUsageFlags,
) -> Result<GpuBuffer> {
    let staging = staging_buffer(ctx, "buffer_staging", bytes)?;
    let buffer = GpuBuffer::new(
        ctx,
        name,
        bytes.len() as u64,
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        MemoryLocation::GpuOnly,
    )?;

    one_shot(ctx, name, |cmd| unsafe {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: bytes.len() as u64,
        };
        ctx.device.cmd_copy_buffer(cmd, staging.handle(), buffer.handle(), &[region]);
    })?;

    Ok(buffer)
}

/// Upload a mesh's vertex and index arrays
pub fn upload_mesh(ctx: &Arc<GpuContext>, mesh: &MeshData) -> Result<GpuMesh> {
    if mesh.vertices.is_empty() || mesh.indices.is_empty() {
        engine_bail!(
            ctx.log,
            SOURCE,
            "Mesh '{}' has {} vertices and {} indices, nothing to draw",
            mesh.name,
            mesh.vertices.len(),
            mesh.indices.len()
        );
    }

    let vertex_buffer = upload_buffer(
        ctx,
        &format!("{}_vertices", mesh.name),
        mesh.vertex_bytes(),
        vk::BufferUsageFlags::VERTEX_BUFFER,
    )?;
    let index_buffer = upload_buffer(
        ctx,
        &format!("{}_indices", mesh.name),
        mesh.index_bytes(),
        vk::BufferUsageFlags::INDEX_BUFFER,
    )?;

    Ok(GpuMesh {
        vertex_buffer,
        index_buffer,
        index_count: mesh.index_count(),
        texture_slot: mesh.texture_slot,
    })
}

/// One copy region per mip level, each reading its own byte range
pub fn mip_copy_regions(texture: &DecodedTexture) -> Vec<vk::BufferImageCopy> {
    texture
        .levels
        .iter()
        .enumerate()
        .map(|(level, mip)| vk::BufferImageCopy {
            buffer_offset: mip.offset as u64,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: level as u32,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D {
                width: mip.width.max(1),
                height: mip.height.max(1),
                depth: 1,
            },
        })
        .collect()
}

/// Create a sampled image sized for the full mip chain and fill every level
pub fn upload_texture(ctx: &Arc<GpuContext>, name: &str, texture: &DecodedTexture) -> Result<Texture> {
    let regions = mip_copy_regions(texture);
    if regions.is_empty() || texture.data.is_empty() {
        engine_bail!(ctx.log, SOURCE, "Texture '{}' has no pixel data", name);
    }

    let staging = staging_buffer(ctx, "texture_staging", &texture.data)?;
    let image = GpuImage::new(
        ctx,
        &ImageDesc {
            name,
            width: texture.width,
            height: texture.height,
            mip_levels: regions.len() as u32,
            format: format_to_vk(texture.format),
            usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            aspect: vk::ImageAspectFlags::COLOR,
        },
    )?;

    one_shot(ctx, name, |cmd| unsafe {
        let levels = image.mip_levels();
        record_transitions(
            &ctx.device,
            cmd,
            &[ImageTransition::UploadToTransferDst.barrier(image.image(), levels)],
        );
        ctx.device.cmd_copy_buffer_to_image(
            cmd,
            staging.handle(),
            image.image(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &regions,
        );
        record_transitions(
            &ctx.device,
            cmd,
            &[ImageTransition::TransferDstToShaderRead.barrier(image.image(), levels)],
        );
    })?;

    engine_trace!(
        ctx.log,
        SOURCE,
        "Uploaded texture '{}' {}x{} {:?}, {} level(s)",
        name,
        texture.width,
        texture.height,
        texture.format,
        regions.len()
    );
    Ok(Texture::new(image, texture.format))
}
