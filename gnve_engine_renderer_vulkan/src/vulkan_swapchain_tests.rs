//! Unit tests for swapchain negotiation helpers
//!
//! Pure functions only; the device-backed paths are covered by the ignored
//! integration tests.

use super::*;

fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
    vk::SurfaceFormatKHR { format, color_space }
}

fn key(format: Option<vk::SurfaceFormatKHR>) -> Option<(vk::Format, vk::ColorSpaceKHR)> {
    format.map(|f| (f.format, f.color_space))
}

fn capabilities(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
    vk::SurfaceCapabilitiesKHR {
        min_image_count: min,
        max_image_count: max,
        current_extent: vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        },
        min_image_extent: vk::Extent2D { width: 1, height: 1 },
        max_image_extent: vk::Extent2D {
            width: 4096,
            height: 4096,
        },
        ..Default::default()
    }
}

// ============================================================================
// SURFACE FORMAT
// ============================================================================

#[test]
fn test_preferred_surface_format_wins() {
    let available = [
        format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
    ];
    assert_eq!(key(negotiate_surface_format(&available)), key(Some(PREFERRED_SURFACE_FORMAT)));
}

#[test]
fn test_surface_format_falls_back_to_first() {
    let available = [
        format(vk::Format::A2B10G10R10_UNORM_PACK32, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
    ];
    assert_eq!(key(negotiate_surface_format(&available)), key(Some(available[0])));
}

#[test]
fn test_preferred_format_needs_matching_color_space() {
    let available = [
        format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
    ];
    assert_eq!(key(negotiate_surface_format(&available)), key(Some(available[0])));
}

#[test]
fn test_no_surface_formats() {
    assert!(negotiate_surface_format(&[]).is_none());
}

// ============================================================================
// PRESENT MODE
// ============================================================================

#[test]
fn test_mailbox_preferred() {
    let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE];
    assert_eq!(negotiate_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
}

#[test]
fn test_fifo_fallback() {
    let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO_RELAXED];
    assert_eq!(negotiate_present_mode(&modes), vk::PresentModeKHR::FIFO);
    assert_eq!(negotiate_present_mode(&[]), vk::PresentModeKHR::FIFO);
}

// ============================================================================
// IMAGE COUNT / EXTENT
// ============================================================================

#[test]
fn test_image_count_uses_requested_when_in_range() {
    assert_eq!(negotiate_image_count(&capabilities(2, 8), 2), 2);
    assert_eq!(negotiate_image_count(&capabilities(1, 8), 3), 3);
}

#[test]
fn test_image_count_raised_to_surface_min() {
    assert_eq!(negotiate_image_count(&capabilities(3, 8), 2), 3);
}

#[test]
fn test_image_count_clamped_to_max() {
    assert_eq!(negotiate_image_count(&capabilities(2, 3), 5), 3);
}

#[test]
fn test_image_count_unbounded_max() {
    assert_eq!(negotiate_image_count(&capabilities(2, 0), 6), 6);
}

#[test]
fn test_image_count_is_stable_across_identical_queries() {
    let caps = capabilities(2, 8);
    assert_eq!(negotiate_image_count(&caps, 2), negotiate_image_count(&caps, 2));
}

#[test]
fn test_extent_uses_window_size_when_surface_is_flexible() {
    let extent = clamp_extent(&capabilities(2, 3), Extent2D::new(1280, 720));
    assert_eq!((extent.width, extent.height), (1280, 720));
}

#[test]
fn test_extent_clamped_to_surface_limits() {
    let extent = clamp_extent(&capabilities(2, 3), Extent2D::new(10_000, 0));
    assert_eq!((extent.width, extent.height), (4096, 1));
}

#[test]
fn test_fixed_surface_extent_wins() {
    let mut caps = capabilities(2, 3);
    caps.current_extent = vk::Extent2D {
        width: 800,
        height: 600,
    };
    let extent = clamp_extent(&caps, Extent2D::new(1024, 768));
    assert_eq!((extent.width, extent.height), (800, 600));
}

// ============================================================================
// DEPTH FORMAT
// ============================================================================

fn depth_support(supported: &'static [vk::Format]) -> impl Fn(vk::Format) -> vk::FormatProperties {
    move |format| {
        let mut props = vk::FormatProperties::default();
        if supported.contains(&format) {
            props.optimal_tiling_features = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
        }
        props
    }
}

#[test]
fn test_depth_prefers_d32() {
    let found = find_depth_format(depth_support(&[vk::Format::D24_UNORM_S8_UINT, vk::Format::D32_SFLOAT]));
    assert_eq!(found, Some(vk::Format::D32_SFLOAT));
}

#[test]
fn test_depth_falls_through_preference_list() {
    assert_eq!(
        find_depth_format(depth_support(&[vk::Format::D32_SFLOAT_S8_UINT, vk::Format::D24_UNORM_S8_UINT])),
        Some(vk::Format::D32_SFLOAT_S8_UINT)
    );
    assert_eq!(
        find_depth_format(depth_support(&[vk::Format::D24_UNORM_S8_UINT])),
        Some(vk::Format::D24_UNORM_S8_UINT)
    );
}

#[test]
fn test_depth_ignores_linear_only_support() {
    let linear_only = |_format: vk::Format| vk::FormatProperties {
        linear_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        ..Default::default()
    };
    assert_eq!(find_depth_format(linear_only), None);
}

#[test]
fn test_stencil_formats_get_both_aspects() {
    assert_eq!(depth_aspect(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
    assert!(depth_aspect(vk::Format::D24_UNORM_S8_UINT).contains(vk::ImageAspectFlags::STENCIL));
    assert!(has_stencil(vk::Format::D32_SFLOAT_S8_UINT));
    assert!(!has_stencil(vk::Format::D32_SFLOAT));
}
