//! Integration tests for VulkanRenderer
//!
//! Every test needs a GPU and a display, so all are #[ignore] and run
//! serially (one device and one window at a time).
//!
//! Shaders come from the workspace `shaders/` directory: precompiled `.spv`
//! files are used when present, otherwise the GLSL sources, which needs the
//! `shaderc` feature.
//!
//! Run with: cargo test --test vulkan_renderer_tests --features shaderc -- --ignored

use gnve_engine::gnve::frame::{Camera, Extent2D, FrameBackend, FrameLoop, TickOutcome, WindowPort};
use gnve_engine::gnve::log::{Log, LogSeverity};
use gnve_engine::gnve::{EngineConfig, Error};
use gnve_engine_renderer_vulkan::VulkanRenderer;
use serial_test::serial;
use std::path::{Path, PathBuf};
use winit::event_loop::EventLoop;
use winit::window::Window;

/// Helper to create a hidden test window
#[allow(deprecated)]
fn create_test_window() -> (Window, EventLoop<()>) {
    let event_loop = EventLoop::new().unwrap();
    let window_attrs = Window::default_attributes()
        .with_title("GNVE Vulkan Test")
        .with_inner_size(winit::dpi::PhysicalSize::new(800, 600))
        .with_visible(false);
    let window = event_loop.create_window(window_attrs).unwrap();
    (window, event_loop)
}

struct TestWindow<'a>(&'a Window);

impl WindowPort for TestWindow<'_> {
    fn framebuffer_size(&self) -> Extent2D {
        let size = self.0.inner_size();
        Extent2D::new(size.width, size.height)
    }

    fn wait_events(&mut self) {
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
}

fn shader(name: &str) -> PathBuf {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../shaders");
    let spv = dir.join(format!("{}.spv", name));
    if spv.exists() {
        spv
    } else {
        dir.join(name)
    }
}

fn test_config() -> EngineConfig {
    EngineConfig {
        width: 800,
        height: 600,
        vertex_shader: shader("mesh.vert"),
        fragment_shader: shader("mesh.frag"),
        enable_validation: true,
        ..Default::default()
    }
}

fn create_renderer(window: &Window, config: &EngineConfig) -> VulkanRenderer {
    VulkanRenderer::new(window, config, Log::console(LogSeverity::Warn)).unwrap()
}

// ============================================================================
// SCENE FILES
// ============================================================================

fn glb(json_body: &str, bin: &[u8]) -> Vec<u8> {
    let mut json = json_body.as_bytes().to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x4E4F_534Au32.to_le_bytes());
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x004E_4942u32.to_le_bytes());
    out.extend_from_slice(&bin);
    out
}

fn png() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([30, 160, 90, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// One textured quad, or an untextured one
fn quad_glb(textured: bool) -> Vec<u8> {
    let positions: [f32; 12] = [-0.5, -0.5, 0.0, 0.5, -0.5, 0.0, 0.5, 0.5, 0.0, -0.5, 0.5, 0.0];
    let uvs: [f32; 8] = [0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0];
    let indices: [u16; 6] = [0, 1, 2, 2, 3, 0];

    let mut bin: Vec<u8> = Vec::new();
    let mut views = Vec::new();
    let mut push = |bytes: &[u8]| {
        while bin.len() % 4 != 0 {
            bin.push(0);
        }
        views.push(format!(r#"{{"buffer":0,"byteOffset":{},"byteLength":{}}}"#, bin.len(), bytes.len()));
        bin.extend_from_slice(bytes);
        views.len() - 1
    };
    let pos_view = push(bytemuck::cast_slice(&positions));
    let uv_view = push(bytemuck::cast_slice(&uvs));
    let index_view = push(bytemuck::cast_slice(&indices));
    let image_view = if textured { Some(push(&png())) } else { None };

    let (material, images) = match image_view {
        Some(view) => (
            r#","material":0"#.to_string(),
            format!(
                r#","images":[{{"bufferView":{},"mimeType":"image/png"}}],"textures":[{{"source":0}}],"materials":[{{"pbrMetallicRoughness":{{"baseColorTexture":{{"index":0}}}}}}]"#,
                view
            ),
        ),
        None => (String::new(), String::new()),
    };

    let json = format!(
        r#"{{"asset":{{"version":"2.0"}},"buffers":[{{"byteLength":{}}}],"bufferViews":[{}],"accessors":[{{"bufferView":{},"componentType":5126,"count":4,"type":"VEC3","min":[-0.5,-0.5,0],"max":[0.5,0.5,0]}},{{"bufferView":{},"componentType":5126,"count":4,"type":"VEC2"}},{{"bufferView":{},"componentType":5123,"count":6,"type":"SCALAR"}}],"meshes":[{{"name":"Quad","primitives":[{{"attributes":{{"POSITION":0,"TEXCOORD_0":1}},"indices":2{}}}]}}]{}}}"#,
        bin.len(),
        views.join(","),
        pos_view,
        uv_view,
        index_view,
        material,
        images
    );
    glb(&json, &bin)
}

fn write_scene(name: &str, bytes: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("gnve_{}_{}.glb", name, std::process::id()));
    std::fs::write(&path, bytes).unwrap();
    path
}

// ============================================================================
// CREATION / SWAPCHAIN
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_renderer_creation() {
    let (window, _event_loop) = create_test_window();
    let config = test_config();
    let renderer = create_renderer(&window, &config);

    assert_eq!(renderer.frames_in_flight(), config.frames_in_flight);
    assert!(renderer.swapchain_image_count() >= 2);
    assert!(!renderer.device_name().is_empty());
    assert_eq!(renderer.texture_count(), 0);
    assert_eq!(renderer.mesh_count(), 0);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_rebuild_at_same_extent_is_stable() {
    let (window, _event_loop) = create_test_window();
    let mut renderer = create_renderer(&window, &test_config());

    let extent = renderer.swapchain_extent();
    let count = renderer.swapchain_image_count();
    let format = renderer.swapchain_format();

    for _ in 0..2 {
        renderer.rebuild_swapchain(extent).unwrap();
        assert_eq!(renderer.swapchain_image_count(), count);
        assert_eq!(renderer.swapchain_format(), format);
        assert_eq!(renderer.swapchain_extent(), extent);
    }
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_zero_extent_rebuild_rejected() {
    let (window, _event_loop) = create_test_window();
    let mut renderer = create_renderer(&window, &test_config());
    assert!(renderer.rebuild_swapchain(Extent2D::new(0, 0)).is_err());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_invalid_config_rejected_before_device_work() {
    let (window, _event_loop) = create_test_window();
    let config = EngineConfig {
        frames_in_flight: 0,
        ..test_config()
    };
    let result = VulkanRenderer::new(&window, &config, Log::disabled());
    assert!(matches!(result, Err(Error::Configuration(_))));
}

// ============================================================================
// SCENE IMPORT
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_import_textured_quad() {
    let (window, _event_loop) = create_test_window();
    let mut renderer = create_renderer(&window, &test_config());
    let path = write_scene("textured", &quad_glb(true));

    let summary = renderer.import_scene(&path).unwrap();

    assert_eq!(summary.meshes, 1);
    assert_eq!(summary.textures, 1);
    assert_eq!(renderer.mesh_count(), 1);
    assert_eq!(renderer.texture_count(), 1);
    std::fs::remove_file(path).ok();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_untextured_scene_gets_fallback_texture() {
    let (window, _event_loop) = create_test_window();
    let mut renderer = create_renderer(&window, &test_config());
    let path = write_scene("untextured", &quad_glb(false));

    let summary = renderer.import_scene(&path).unwrap();

    assert_eq!(summary.textures, 0);
    // Slot 0 is populated before anything is drawn
    assert_eq!(renderer.texture_count(), 1);
    std::fs::remove_file(path).ok();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_texture_capacity_exceeded() {
    let (window, _event_loop) = create_test_window();
    let config = EngineConfig {
        max_textures: 1,
        ..test_config()
    };
    let mut renderer = create_renderer(&window, &config);
    let path = write_scene("capacity", &quad_glb(true));

    renderer.import_scene(&path).unwrap();
    let second = renderer.import_scene(&path);

    assert!(matches!(second, Err(Error::Configuration(_))));
    assert_eq!(renderer.texture_count(), 1);
    std::fs::remove_file(path).ok();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_missing_scene_file() {
    let (window, _event_loop) = create_test_window();
    let mut renderer = create_renderer(&window, &test_config());
    assert!(matches!(
        renderer.import_scene("does/not/exist.glb"),
        Err(Error::Asset(_))
    ));
}

// ============================================================================
// FRAME LOOP
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_frames_render_and_present() {
    let (window, _event_loop) = create_test_window();
    let config = test_config();
    let mut renderer = create_renderer(&window, &config);
    let path = write_scene("frames", &quad_glb(true));
    renderer.import_scene(&path).unwrap();

    let mut frame_loop = FrameLoop::new(config.frames_in_flight, Log::disabled());
    let mut port = TestWindow(&window);
    let camera = Camera::default();

    let mut presented = 0;
    for frame in 0..10 {
        let uniforms = camera.uniforms(frame as f32 * 0.016, renderer.swapchain_extent());
        match frame_loop.tick(&mut renderer, &mut port, &uniforms).unwrap() {
            TickOutcome::Presented | TickOutcome::PresentedAndRebuilt => presented += 1,
            TickOutcome::SkippedPresent | TickOutcome::OutOfDate => {}
        }
    }
    renderer.wait_idle().unwrap();

    assert!(presented > 0);
    // The loop cycles through every slot
    assert_eq!(frame_loop.current_slot().get(), 10 % config.frames_in_flight);

    if let Some(stats) = renderer.validation_stats() {
        assert_eq!(stats.errors, 0, "validation errors during rendering");
    }
    std::fs::remove_file(path).ok();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_resize_signal_rebuilds_swapchain() {
    let (window, _event_loop) = create_test_window();
    let config = test_config();
    let mut renderer = create_renderer(&window, &config);
    let mut frame_loop = FrameLoop::new(config.frames_in_flight, Log::disabled());
    let mut port = TestWindow(&window);
    let uniforms = Camera::default().uniforms(0.0, renderer.swapchain_extent());

    frame_loop.tick(&mut renderer, &mut port, &uniforms).unwrap();
    frame_loop.resize_signal().notify();
    let outcome = frame_loop.tick(&mut renderer, &mut port, &uniforms).unwrap();

    assert_ne!(outcome, TickOutcome::Presented);
    assert!(frame_loop.stats().swapchain_rebuilds >= 1);
}
