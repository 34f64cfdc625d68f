/// ForwardPipeline - the single graphics pipeline of the forward pass
///
/// Built for dynamic rendering against the swapchain color format and the
/// shared depth format. Materials vary only through the bindless slot pushed
/// as a fragment-stage constant, so no other pipeline is ever bound.

use ash::vk;
use gnve_engine::gnve::asset::Vertex;
use gnve_engine::gnve::Result;
use gnve_engine::engine_info;
use std::ffi::CStr;
use std::path::Path;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_shader::{ShaderModule, PUSH_CONSTANT_SIZE};
use crate::vulkan_swapchain::has_stencil;

const SOURCE: &str = "gnve::vulkan::pipeline";

const ENTRY_POINT: &CStr = c"main";

/// Single interleaved vertex stream
pub fn vertex_binding() -> vk::VertexInputBindingDescription {
    vk::VertexInputBindingDescription {
        binding: 0,
        stride: Vertex::STRIDE,
        input_rate: vk::VertexInputRate::VERTEX,
    }
}

/// location 0: position (vec3), location 1: uv (vec2)
pub fn vertex_attributes() -> [vk::VertexInputAttributeDescription; 2] {
    [
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 0,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: Vertex::UV_OFFSET,
        },
    ]
}

/// The texture slot push constant, read by the fragment stage
pub fn push_constant_range() -> vk::PushConstantRange {
    vk::PushConstantRange {
        stage_flags: vk::ShaderStageFlags::FRAGMENT,
        offset: 0,
        size: PUSH_CONSTANT_SIZE,
    }
}

pub struct ForwardPipeline {
    ctx: Arc<GpuContext>,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl ForwardPipeline {
    pub fn new(
        ctx: &Arc<GpuContext>,
        set_layout: vk::DescriptorSetLayout,
        color_format: vk::Format,
        depth_format: vk::Format,
        vertex_shader: &Path,
        fragment_shader: &Path,
    ) -> Result<Self> {
        let vertex = ShaderModule::load(ctx, vertex_shader, vk::ShaderStageFlags::VERTEX)?;
        let fragment = ShaderModule::load(ctx, fragment_shader, vk::ShaderStageFlags::FRAGMENT)?;

        let mut this = Self {
            ctx: Arc::clone(ctx),
            pipeline: vk::Pipeline::null(),
            layout: vk::PipelineLayout::null(),
        };

        unsafe {
            let set_layouts = [set_layout];
            let push_ranges = [push_constant_range()];
            let layout_info = vk::PipelineLayoutCreateInfo::default()
                .set_layouts(&set_layouts)
                .push_constant_ranges(&push_ranges);
            this.layout = ctx.check("create pipeline layout", ctx.device.create_pipeline_layout(&layout_info, None))?;

            let stages = [
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(vertex.stage())
                    .module(vertex.handle())
                    .name(ENTRY_POINT),
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(fragment.stage())
                    .module(fragment.handle())
                    .name(ENTRY_POINT),
            ];

            let bindings = [vertex_binding()];
            let attributes = vertex_attributes();
            let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
                .vertex_binding_descriptions(&bindings)
                .vertex_attribute_descriptions(&attributes);

            let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
                .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
                .primitive_restart_enable(false);

            // Dynamic; only the counts matter here
            let viewport_state = vk::PipelineViewportStateCreateInfo::default()
                .viewport_count(1)
                .scissor_count(1);

            let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
                .polygon_mode(vk::PolygonMode::FILL)
                .cull_mode(vk::CullModeFlags::NONE)
                .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
                .line_width(1.0);

            let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
                .depth_test_enable(true)
                .depth_write_enable(true)
                .depth_compare_op(vk::CompareOp::LESS)
                .depth_bounds_test_enable(false)
                .stencil_test_enable(false);

            let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
                .rasterization_samples(vk::SampleCountFlags::TYPE_1);

            let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false);
            let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
                .logic_op_enable(false)
                .attachments(std::slice::from_ref(&color_blend_attachment));

            let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
            let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

            let color_formats = [color_format];
            let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
                .color_attachment_formats(&color_formats)
                .depth_attachment_format(depth_format);
            if has_stencil(depth_format) {
                rendering_info = rendering_info.stencil_attachment_format(depth_format);
            }

            let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
                .stages(&stages)
                .vertex_input_state(&vertex_input_state)
                .input_assembly_state(&input_assembly_state)
                .viewport_state(&viewport_state)
                .rasterization_state(&rasterization_state)
                .depth_stencil_state(&depth_stencil_state)
                .multisample_state(&multisample_state)
                .color_blend_state(&color_blend_state)
                .dynamic_state(&dynamic_state)
                .layout(this.layout)
                .push_next(&mut rendering_info);

            let pipelines = ctx.check(
                "create forward pipeline",
                ctx.device
                    .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                    .map_err(|(_, e)| e),
            )?;
            this.pipeline = pipelines.first().copied().unwrap_or_default();
        }

        engine_info!(
            ctx.log,
            SOURCE,
            "Forward pipeline ready (color {:?}, depth {:?})",
            color_format,
            depth_format
        );
        Ok(this)
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for ForwardPipeline {
    fn drop(&mut self) {
        unsafe {
            if self.pipeline != vk::Pipeline::null() {
                self.ctx.device.destroy_pipeline(self.pipeline, None);
            }
            if self.layout != vk::PipelineLayout::null() {
                self.ctx.device.destroy_pipeline_layout(self.layout, None);
            }
        }
    }
}
