/// Physical device selection and logical device creation
///
/// A device qualifies when it has a graphics queue, a queue that can present
/// to the surface, the swapchain extension, and every feature the renderer
/// relies on (dynamic rendering, synchronization2, descriptor indexing for
/// the bindless table, BC texture compression). Discrete GPUs are preferred.

use ash::vk;
use gnve_engine::gnve::log::Log;
use gnve_engine::gnve::{Error, Result};
use gnve_engine::{engine_debug, engine_error, engine_info, engine_warn};

use crate::vulkan_context::vk_check;

const SOURCE: &str = "gnve::vulkan::device";

/// Lower is better
pub fn device_type_rank(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 0,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 3,
        _ => 4,
    }
}

/// Names of required features the device lacks
pub fn missing_features(
    core: &vk::PhysicalDeviceFeatures,
    vk12: &vk::PhysicalDeviceVulkan12Features<'_>,
    vk13: &vk::PhysicalDeviceVulkan13Features<'_>,
) -> Vec<&'static str> {
    let required = [
        (core.texture_compression_bc, "textureCompressionBC"),
        (core.sampler_anisotropy, "samplerAnisotropy"),
        (vk12.descriptor_indexing, "descriptorIndexing"),
        (vk12.runtime_descriptor_array, "runtimeDescriptorArray"),
        (vk12.descriptor_binding_partially_bound, "descriptorBindingPartiallyBound"),
        (
            vk12.descriptor_binding_variable_descriptor_count,
            "descriptorBindingVariableDescriptorCount",
        ),
        (
            vk12.descriptor_binding_sampled_image_update_after_bind,
            "descriptorBindingSampledImageUpdateAfterBind",
        ),
        (
            vk12.descriptor_binding_update_unused_while_pending,
            "descriptorBindingUpdateUnusedWhilePending",
        ),
        (
            vk12.shader_sampled_image_array_non_uniform_indexing,
            "shaderSampledImageArrayNonUniformIndexing",
        ),
        (vk13.dynamic_rendering, "dynamicRendering"),
        (vk13.synchronization2, "synchronization2"),
    ];
    required
        .iter()
        .filter(|(supported, _)| *supported != vk::TRUE)
        .map(|&(_, name)| name)
        .collect()
}

/// The chosen physical device and its queue families
#[derive(Debug, Clone)]
pub struct DeviceSelection {
    pub physical_device: vk::PhysicalDevice,
    pub name: String,
    pub graphics_family: u32,
    pub present_family: u32,
    pub max_sampler_anisotropy: f32,
}

struct Candidate {
    selection: DeviceSelection,
    rank: u32,
}

/// Pick the best device able to render to `surface` with `max_textures` slots
pub fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    max_textures: u32,
    log: &Log,
) -> Result<DeviceSelection> {
    let devices = vk_check(log, "enumerate physical devices", unsafe { instance.enumerate_physical_devices() })?;
    if devices.is_empty() {
        engine_error!(log, SOURCE, "No Vulkan-capable GPU found");
        return Err(Error::Configuration("no Vulkan-capable GPU found".to_string()));
    }

    let mut best: Option<Candidate> = None;
    for physical_device in devices {
        match evaluate(instance, surface_loader, surface, physical_device, max_textures) {
            Ok(candidate) => {
                engine_debug!(log, SOURCE, "Candidate GPU '{}' (rank {})", candidate.selection.name, candidate.rank);
                if best.as_ref().map_or(true, |b| candidate.rank < b.rank) {
                    best = Some(candidate);
                }
            }
            Err(reason) => engine_warn!(log, SOURCE, "Skipping GPU: {}", reason),
        }
    }

    let chosen = best.ok_or_else(|| {
        engine_error!(log, SOURCE, "No GPU supports the features required by the renderer");
        Error::Configuration("no suitable GPU found (see warnings for missing features)".to_string())
    })?;
    engine_info!(log, SOURCE, "Using GPU '{}'", chosen.selection.name);
    Ok(chosen.selection)
}

fn evaluate(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    max_textures: u32,
) -> std::result::Result<Candidate, String> {
    unsafe {
        let mut props12 = vk::PhysicalDeviceVulkan12Properties::default();
        let mut props2 = vk::PhysicalDeviceProperties2::default().push_next(&mut props12);
        instance.get_physical_device_properties2(physical_device, &mut props2);
        let properties = props2.properties;
        let name = properties
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unnamed>".to_string());

        if vk::api_version_major(properties.api_version) == 1 && vk::api_version_minor(properties.api_version) < 3 {
            return Err(format!("'{}' only supports Vulkan 1.{}", name, vk::api_version_minor(properties.api_version)));
        }

        let update_after_bind_limit = props12
            .max_per_stage_descriptor_update_after_bind_samplers
            .min(props12.max_per_stage_descriptor_update_after_bind_sampled_images);
        if update_after_bind_limit < max_textures {
            return Err(format!(
                "'{}' allows {} update-after-bind textures per stage, {} requested",
                name, update_after_bind_limit, max_textures
            ));
        }

        let extensions = instance
            .enumerate_device_extension_properties(physical_device)
            .map_err(|e| format!("'{}': cannot list extensions: {:?}", name, e))?;
        let has_swapchain = extensions.iter().any(|ext| {
            ext.extension_name_as_c_str()
                .is_ok_and(|ext_name| ext_name == ash::khr::swapchain::NAME)
        });
        if !has_swapchain {
            return Err(format!("'{}' lacks {:?}", name, ash::khr::swapchain::NAME));
        }

        let mut vk12 = vk::PhysicalDeviceVulkan12Features::default();
        let mut vk13 = vk::PhysicalDeviceVulkan13Features::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut vk12)
            .push_next(&mut vk13);
        instance.get_physical_device_features2(physical_device, &mut features2);
        let core = features2.features;
        let missing = missing_features(&core, &vk12, &vk13);
        if !missing.is_empty() {
            return Err(format!("'{}' lacks {}", name, missing.join(", ")));
        }

        let families = instance.get_physical_device_queue_family_properties(physical_device);
        let graphics_family = families
            .iter()
            .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .ok_or_else(|| format!("'{}' has no graphics queue", name))? as u32;
        let supports_present = |index: u32| {
            surface_loader
                .get_physical_device_surface_support(physical_device, index, surface)
                .unwrap_or(false)
        };
        // Prefer presenting from the graphics family
        let present_family = if supports_present(graphics_family) {
            graphics_family
        } else {
            (0..families.len() as u32)
                .find(|&index| supports_present(index))
                .ok_or_else(|| format!("'{}' cannot present to the window surface", name))?
        };

        Ok(Candidate {
            rank: device_type_rank(properties.device_type),
            selection: DeviceSelection {
                physical_device,
                name,
                graphics_family,
                present_family,
                max_sampler_anisotropy: properties.limits.max_sampler_anisotropy,
            },
        })
    }
}

/// Create the logical device with the renderer's feature set enabled
pub fn create_logical_device(instance: &ash::Instance, selection: &DeviceSelection, log: &Log) -> Result<ash::Device> {
    let queue_priorities = [1.0];
    let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
        .queue_family_index(selection.graphics_family)
        .queue_priorities(&queue_priorities)];
    if selection.present_family != selection.graphics_family {
        queue_create_infos.push(
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(selection.present_family)
                .queue_priorities(&queue_priorities),
        );
    }

    let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];

    let core = vk::PhysicalDeviceFeatures::default()
        .sampler_anisotropy(true)
        .texture_compression_bc(true);
    let mut vk12 = vk::PhysicalDeviceVulkan12Features::default()
        .descriptor_indexing(true)
        .runtime_descriptor_array(true)
        .descriptor_binding_partially_bound(true)
        .descriptor_binding_variable_descriptor_count(true)
        .descriptor_binding_sampled_image_update_after_bind(true)
        .descriptor_binding_update_unused_while_pending(true)
        .shader_sampled_image_array_non_uniform_indexing(true);
    let mut vk13 = vk::PhysicalDeviceVulkan13Features::default()
        .dynamic_rendering(true)
        .synchronization2(true);

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&device_extension_names)
        .enabled_features(&core)
        .push_next(&mut vk12)
        .push_next(&mut vk13);

    vk_check(log, "create logical device", unsafe {
        instance.create_device(selection.physical_device, &device_create_info, None)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_core() -> vk::PhysicalDeviceFeatures {
        vk::PhysicalDeviceFeatures::default()
            .texture_compression_bc(true)
            .sampler_anisotropy(true)
    }

    fn full_vk12() -> vk::PhysicalDeviceVulkan12Features<'static> {
        vk::PhysicalDeviceVulkan12Features::default()
            .descriptor_indexing(true)
            .runtime_descriptor_array(true)
            .descriptor_binding_partially_bound(true)
            .descriptor_binding_variable_descriptor_count(true)
            .descriptor_binding_sampled_image_update_after_bind(true)
            .descriptor_binding_update_unused_while_pending(true)
            .shader_sampled_image_array_non_uniform_indexing(true)
    }

    fn full_vk13() -> vk::PhysicalDeviceVulkan13Features<'static> {
        vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true)
    }

    #[test]
    fn test_discrete_ranks_first() {
        let mut types = [
            vk::PhysicalDeviceType::CPU,
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            vk::PhysicalDeviceType::DISCRETE_GPU,
            vk::PhysicalDeviceType::VIRTUAL_GPU,
        ];
        types.sort_by_key(|&t| device_type_rank(t));
        assert_eq!(types[0], vk::PhysicalDeviceType::DISCRETE_GPU);
        assert_eq!(types[1], vk::PhysicalDeviceType::INTEGRATED_GPU);
        assert_eq!(types[3], vk::PhysicalDeviceType::CPU);
    }

    #[test]
    fn test_fully_featured_device_has_nothing_missing() {
        assert!(missing_features(&full_core(), &full_vk12(), &full_vk13()).is_empty());
    }

    #[test]
    fn test_missing_dynamic_rendering_reported() {
        let vk13 = full_vk13().dynamic_rendering(false);
        assert_eq!(missing_features(&full_core(), &full_vk12(), &vk13), vec!["dynamicRendering"]);
    }

    #[test]
    fn test_missing_bindless_features_reported() {
        let vk12 = full_vk12()
            .descriptor_binding_partially_bound(false)
            .descriptor_binding_variable_descriptor_count(false);
        let missing = missing_features(&full_core(), &vk12, &full_vk13());
        assert_eq!(
            missing,
            vec!["descriptorBindingPartiallyBound", "descriptorBindingVariableDescriptorCount"]
        );
    }

    #[test]
    fn test_bare_device_misses_everything() {
        let missing = missing_features(
            &vk::PhysicalDeviceFeatures::default(),
            &vk::PhysicalDeviceVulkan12Features::default(),
            &vk::PhysicalDeviceVulkan13Features::default(),
        );
        assert_eq!(missing.len(), 11);
        assert!(missing.contains(&"textureCompressionBC"));
    }
}
