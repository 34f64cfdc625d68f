/// Shader modules for the forward pipeline
///
/// `.spv` files are loaded as-is. With the `shaderc` feature, `.vert` and
/// `.frag` GLSL sources are compiled at load time. Every module is reflected
/// with spirq and checked against the bindless layout before use, so a shader
/// that expects a different interface fails at startup instead of at draw.

use ash::vk;
use gnve_engine::gnve::log::Log;
use gnve_engine::gnve::Result;
use gnve_engine::{engine_bail, engine_debug, engine_err};
use std::path::Path;
use std::sync::Arc;

use crate::vulkan_bindless::{TEXTURE_BINDING, UNIFORM_BINDING};
use crate::vulkan_context::GpuContext;

const SOURCE: &str = "gnve::vulkan::shader";

/// Push constant block size the pipeline layout declares (one u32 slot index)
pub const PUSH_CONSTANT_SIZE: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    UniformBuffer,
    CombinedImageSampler,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBinding {
    pub name: String,
    pub set: u32,
    pub binding: u32,
    pub kind: BindingKind,
}

/// Resources a shader stage declares
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderInterface {
    pub bindings: Vec<ShaderBinding>,
    /// Size of the push constant block, if the stage declares one
    pub push_constant_size: Option<u32>,
}

/// Problems with `interface` against the bindless layout, empty if compatible
pub fn validate_interface(interface: &ShaderInterface) -> Vec<String> {
    let mut problems = Vec::new();
    for binding in &interface.bindings {
        let expected = match (binding.set, binding.binding) {
            (0, UNIFORM_BINDING) => BindingKind::UniformBuffer,
            (0, TEXTURE_BINDING) => BindingKind::CombinedImageSampler,
            (set, index) => {
                problems.push(format!(
                    "'{}' at set {} binding {} is not part of the bindless layout",
                    binding.name, set, index
                ));
                continue;
            }
        };
        if binding.kind != expected {
            problems.push(format!(
                "'{}' at binding {} is {:?}, expected {:?}",
                binding.name, binding.binding, binding.kind, expected
            ));
        }
    }
    if let Some(size) = interface.push_constant_size {
        if size > PUSH_CONSTANT_SIZE {
            problems.push(format!(
                "push constant block is {} bytes, only {} are pushed",
                size, PUSH_CONSTANT_SIZE
            ));
        }
    }
    problems
}

/// Reflect the descriptor bindings and push constants of a SPIR-V module
pub fn reflect(code: &[u32]) -> std::result::Result<ShaderInterface, String> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| format!("SPIR-V reflection failed: {:?}", e))?;

    let mut interface = ShaderInterface::default();
    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            match var {
                spirq::var::Variable::Descriptor {
                    name, desc_bind, desc_ty, ..
                } => {
                    let kind = match desc_ty {
                        spirq::ty::DescriptorType::UniformBuffer() => BindingKind::UniformBuffer,
                        spirq::ty::DescriptorType::CombinedImageSampler() => BindingKind::CombinedImageSampler,
                        _ => BindingKind::Other,
                    };
                    interface.bindings.push(ShaderBinding {
                        name: name.clone().unwrap_or_default(),
                        set: desc_bind.set(),
                        binding: desc_bind.bind(),
                        kind,
                    });
                }
                spirq::var::Variable::PushConstant { ty, .. } => {
                    let size = ty.nbyte().map(|s| s as u32).unwrap_or(0);
                    interface.push_constant_size = Some(interface.push_constant_size.unwrap_or(0).max(size));
                }
                _ => {}
            }
        }
    }
    Ok(interface)
}

/// Read SPIR-V words from `path`, compiling GLSL first when supported
pub fn load_spirv(path: &Path, stage: vk::ShaderStageFlags, log: &Log) -> Result<Vec<u32>> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    match extension {
        "spv" => {
            let mut file = std::fs::File::open(path)
                .map_err(|e| engine_err!(log, SOURCE, "Cannot open shader '{}': {}", path.display(), e))?;
            ash::util::read_spv(&mut file)
                .map_err(|e| engine_err!(log, SOURCE, "Invalid SPIR-V in '{}': {}", path.display(), e))
        }
        "vert" | "frag" => compile_glsl(path, stage, log),
        _ => engine_bail!(
            log,
            SOURCE,
            "Unsupported shader file '{}' (expected .spv, .vert or .frag)",
            path.display()
        ),
    }
}

#[cfg(feature = "shaderc")]
fn compile_glsl(path: &Path, stage: vk::ShaderStageFlags, log: &Log) -> Result<Vec<u32>> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| engine_err!(log, SOURCE, "Cannot read shader '{}': {}", path.display(), e))?;
    let kind = if stage == vk::ShaderStageFlags::VERTEX {
        shaderc::ShaderKind::Vertex
    } else {
        shaderc::ShaderKind::Fragment
    };
    let compiler = shaderc::Compiler::new()
        .ok_or_else(|| engine_err!(log, SOURCE, "shaderc compiler unavailable"))?;
    let file_name = path.to_string_lossy();
    let artifact = compiler
        .compile_into_spirv(&source, kind, &file_name, "main", None)
        .map_err(|e| engine_err!(log, SOURCE, "Failed to compile '{}':\n{}", path.display(), e))?;
    engine_debug!(log, SOURCE, "Compiled '{}' ({} words)", path.display(), artifact.len());
    Ok(artifact.as_binary().to_vec())
}

#[cfg(not(feature = "shaderc"))]
fn compile_glsl(path: &Path, _stage: vk::ShaderStageFlags, log: &Log) -> Result<Vec<u32>> {
    engine_bail!(
        log,
        SOURCE,
        "'{}' is GLSL; rebuild with the `shaderc` feature or pass a .spv file",
        path.display()
    )
}

/// A reflected, validated VkShaderModule
pub struct ShaderModule {
    ctx: Arc<GpuContext>,
    module: vk::ShaderModule,
    stage: vk::ShaderStageFlags,
    interface: ShaderInterface,
}

impl ShaderModule {
    pub fn load(ctx: &Arc<GpuContext>, path: &Path, stage: vk::ShaderStageFlags) -> Result<Self> {
        let code = load_spirv(path, stage, &ctx.log)?;
        let interface =
            reflect(&code).map_err(|e| engine_err!(ctx.log, SOURCE, "'{}': {}", path.display(), e))?;
        let problems = validate_interface(&interface);
        if !problems.is_empty() {
            engine_bail!(
                ctx.log,
                SOURCE,
                "'{}' does not match the bindless layout: {}",
                path.display(),
                problems.join("; ")
            );
        }

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe { ctx.check("create shader module", ctx.device.create_shader_module(&create_info, None))? };
        engine_debug!(
            ctx.log,
            SOURCE,
            "Loaded {:?} shader '{}' ({} binding(s))",
            stage,
            path.display(),
            interface.bindings.len()
        );
        Ok(Self {
            ctx: Arc::clone(ctx),
            module,
            stage,
            interface,
        })
    }

    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    pub fn stage(&self) -> vk::ShaderStageFlags {
        self.stage
    }

    pub fn interface(&self) -> &ShaderInterface {
        &self.interface
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_shader_module(self.module, None);
        }
    }
}
