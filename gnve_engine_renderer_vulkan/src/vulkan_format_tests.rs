//! Unit tests for Vulkan format conversion functions
//!
//! Tests pure format conversion functions without requiring GPU.

use super::*;

// ============================================================================
// TEXTURE FORMAT CONVERSION TESTS
// ============================================================================

#[test]
fn test_uncompressed_formats_map_to_rgba8() {
    assert_eq!(format_to_vk(TextureFormat::Rgba8Srgb), vk::Format::R8G8B8A8_SRGB);
    assert_eq!(format_to_vk(TextureFormat::Rgba8Unorm), vk::Format::R8G8B8A8_UNORM);
}

#[test]
fn test_block_formats_map_to_block_formats() {
    assert_eq!(format_to_vk(TextureFormat::Bc1RgbaSrgb), vk::Format::BC1_RGBA_SRGB_BLOCK);
    assert_eq!(format_to_vk(TextureFormat::Bc1RgbaUnorm), vk::Format::BC1_RGBA_UNORM_BLOCK);
    assert_eq!(format_to_vk(TextureFormat::Bc3Srgb), vk::Format::BC3_SRGB_BLOCK);
    assert_eq!(format_to_vk(TextureFormat::Bc3Unorm), vk::Format::BC3_UNORM_BLOCK);
    assert_eq!(format_to_vk(TextureFormat::Bc5Unorm), vk::Format::BC5_UNORM_BLOCK);
    assert_eq!(format_to_vk(TextureFormat::Bc7Unorm), vk::Format::BC7_UNORM_BLOCK);
}

#[test]
fn test_transcode_target_is_bc7_srgb() {
    assert_eq!(
        format_to_vk(TextureFormat::TRANSCODE_TARGET),
        vk::Format::BC7_SRGB_BLOCK
    );
}

#[test]
fn test_srgb_variants_stay_srgb() {
    let srgb = [
        TextureFormat::Rgba8Srgb,
        TextureFormat::Bc1RgbaSrgb,
        TextureFormat::Bc3Srgb,
        TextureFormat::Bc7Srgb,
    ];
    for format in srgb {
        let name = format!("{:?}", format_to_vk(format));
        assert!(name.contains("SRGB"), "{:?} mapped to {}", format, name);
    }
}

#[test]
fn test_block_compressed_flag_matches_vulkan_block_formats() {
    let all = [
        TextureFormat::Rgba8Srgb,
        TextureFormat::Rgba8Unorm,
        TextureFormat::Bc1RgbaSrgb,
        TextureFormat::Bc1RgbaUnorm,
        TextureFormat::Bc3Srgb,
        TextureFormat::Bc3Unorm,
        TextureFormat::Bc5Unorm,
        TextureFormat::Bc7Srgb,
        TextureFormat::Bc7Unorm,
    ];
    for format in all {
        let name = format!("{:?}", format_to_vk(format));
        assert_eq!(format.is_block_compressed(), name.ends_with("_BLOCK"), "{:?}", format);
    }
}
