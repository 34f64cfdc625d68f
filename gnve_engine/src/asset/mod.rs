//! Asset import pipeline (CPU half)
//!
//! Parses a scene document, decodes or transcodes its embedded textures,
//! assembles meshes, and drives an [`AssetUploader`] that owns the GPU side.

pub mod import;
pub mod import_error;
pub mod mesh;
pub mod scene;
pub mod texture;

pub use import::{import_scene, import_scene_file, AssetUploader, ImportedMesh, ImportedScene};
pub use import_error::ImportError;
pub use mesh::{widen_indices, MeshData, SourceIndices, Vertex};
pub use scene::{EmbeddedImage, SceneDocument};
pub use texture::{decode_image, sniff_mime, DecodedTexture, MipLevel, TextureFormat};
