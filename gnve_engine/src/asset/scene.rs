//! Scene document parsing (glTF 2.0 / GLB)
//!
//! Only self-contained documents are accepted: images must live in buffer
//! views. Buffers may be embedded (GLB BIN chunk, data URIs) or sit next to
//! the document on disk.

use std::path::Path;

use gltf::accessor::{DataType, Dimensions};
use gltf::mesh::Semantic;

use super::import_error::ImportError;
use super::mesh::{widen_indices, MeshData, SourceIndices, Vertex};
use super::texture::sniff_mime;
use crate::bindless::TextureSlot;

/// Parsed document plus its resolved buffer data
pub struct SceneDocument {
    document: gltf::Document,
    buffers: Vec<gltf::buffer::Data>,
}

/// Encoded bytes of one embedded image
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedImage<'a> {
    pub index: usize,
    pub mime: &'a str,
    pub bytes: &'a [u8],
}

impl SceneDocument {
    /// Read and parse a scene file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ImportError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ImportError::FileNotFound(path.display().to_string()),
            _ => ImportError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            },
        })?;
        Self::parse(&bytes, path.parent())
    }

    /// Parse an in-memory document; external buffer files are not resolved
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ImportError> {
        Self::parse(bytes, None)
    }

    fn parse(bytes: &[u8], base: Option<&Path>) -> Result<Self, ImportError> {
        let gltf::Gltf { document, blob } =
            gltf::Gltf::from_slice(bytes).map_err(|e| ImportError::MalformedDocument(e.to_string()))?;
        let buffers = gltf::import_buffers(&document, base, blob)
            .map_err(|e| ImportError::MalformedDocument(format!("buffer data: {}", e)))?;
        Ok(Self { document, buffers })
    }

    pub fn document(&self) -> &gltf::Document {
        &self.document
    }

    pub fn image_count(&self) -> usize {
        self.document.images().len()
    }

    pub fn mesh_count(&self) -> usize {
        self.document.meshes().len()
    }

    /// Encoded bytes of every image, in document order
    pub fn images(&self) -> Result<Vec<EmbeddedImage<'_>>, ImportError> {
        self.document
            .images()
            .map(|image| self.embedded_image(&image))
            .collect()
    }

    fn embedded_image<'a>(&'a self, image: &gltf::Image<'a>) -> Result<EmbeddedImage<'a>, ImportError> {
        let index = image.index();
        match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let buffer = self.buffers.get(view.buffer().index()).ok_or_else(|| {
                    ImportError::MalformedDocument(format!("image {} references a missing buffer", index))
                })?;
                let bytes = buffer
                    .0
                    .get(view.offset()..view.offset() + view.length())
                    .ok_or_else(|| {
                        ImportError::MalformedDocument(format!("image {} view is out of buffer bounds", index))
                    })?;
                let mime = match mime_type {
                    "" => sniff_mime(bytes).ok_or_else(|| ImportError::UnsupportedMimeType {
                        image: index,
                        mime: "(unknown)".to_string(),
                    })?,
                    declared => declared,
                };
                Ok(EmbeddedImage { index, mime, bytes })
            }
            gltf::image::Source::Uri { uri, .. } => Err(ImportError::UnsupportedImageSource {
                image: index,
                reason: format!("external or URI image '{}'", truncate(uri, 48)),
            }),
        }
    }

    /// Build every mesh, merging its primitives into one vertex/index pair
    ///
    /// `image_slots[i]` is the texture slot assigned to image `i`.
    pub fn meshes(&self, image_slots: &[TextureSlot]) -> Result<Vec<MeshData>, ImportError> {
        self.document
            .meshes()
            .map(|mesh| self.build_mesh(&mesh, image_slots))
            .collect()
    }

    fn build_mesh(&self, mesh: &gltf::Mesh<'_>, image_slots: &[TextureSlot]) -> Result<MeshData, ImportError> {
        let name = mesh
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("mesh{}", mesh.index()));
        let mut data = MeshData {
            name: name.clone(),
            ..Default::default()
        };

        for (i, primitive) in mesh.primitives().enumerate() {
            if i == 0 {
                data.texture_slot = base_color_slot(&primitive, image_slots);
            }

            if primitive.mode() != gltf::mesh::Mode::Triangles {
                return Err(ImportError::UnsupportedPrimitiveMode {
                    mesh: name.clone(),
                    mode: format!("{:?}", primitive.mode()),
                });
            }

            let has_position = check_accessor(&name, &primitive, Semantic::Positions, "POSITION", |t, d| {
                t == DataType::F32 && d == Dimensions::Vec3
            })?;
            if !has_position {
                return Err(ImportError::MissingAccessor {
                    mesh: name.clone(),
                    attribute: "POSITION".to_string(),
                });
            }
            let has_uv = check_accessor(&name, &primitive, Semantic::TexCoords(0), "TEXCOORD_0", |t, d| {
                matches!(t, DataType::F32 | DataType::U8 | DataType::U16) && d == Dimensions::Vec2
            })?;
            let index_accessor = primitive.indices().ok_or_else(|| ImportError::MissingAccessor {
                mesh: name.clone(),
                attribute: "indices".to_string(),
            })?;
            match (index_accessor.data_type(), index_accessor.dimensions()) {
                (DataType::U8 | DataType::U16 | DataType::U32, Dimensions::Scalar) => {}
                (t, d) => {
                    return Err(ImportError::UnsupportedIndexType {
                        mesh: name.clone(),
                        found: format!("{:?} {:?}", t, d),
                    })
                }
            }

            let reader = primitive.reader(|buffer| self.buffers.get(buffer.index()).map(|b| b.0.as_slice()));
            let missing_data = |attribute: &str| {
                ImportError::MalformedDocument(format!("mesh '{}': {} has no buffer data", name, attribute))
            };

            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .ok_or_else(|| missing_data("POSITION"))?
                .collect();
            let uvs: Vec<[f32; 2]> = if has_uv {
                reader
                    .read_tex_coords(0)
                    .ok_or_else(|| missing_data("TEXCOORD_0"))?
                    .into_f32()
                    .collect()
            } else {
                Vec::new()
            };
            let indices: SourceIndices = reader.read_indices().ok_or_else(|| missing_data("indices"))?.into();

            if let Some(max) = indices.max_index() {
                if max as usize >= positions.len() {
                    return Err(ImportError::MalformedDocument(format!(
                        "mesh '{}': index {} out of range for {} vertices",
                        name,
                        max,
                        positions.len()
                    )));
                }
            }

            let vertex_base = data.vertices.len() as u32;
            data.vertices.extend(positions.iter().enumerate().map(|(v, &position)| Vertex {
                position,
                uv: uvs.get(v).copied().unwrap_or([0.0, 0.0]),
            }));
            data.indices.extend(widen_indices(&indices, vertex_base)?);
        }

        Ok(data)
    }
}

/// Validate an attribute's component type and shape; `Ok(false)` when absent
fn check_accessor(
    mesh: &str,
    primitive: &gltf::Primitive<'_>,
    semantic: Semantic,
    attribute: &str,
    accept: impl Fn(DataType, Dimensions) -> bool,
) -> Result<bool, ImportError> {
    let Some(accessor) = primitive.get(&semantic) else {
        return Ok(false);
    };
    if !accept(accessor.data_type(), accessor.dimensions()) {
        return Err(ImportError::UnsupportedAccessor {
            mesh: mesh.to_string(),
            attribute: attribute.to_string(),
            found: format!("{:?} {:?}", accessor.data_type(), accessor.dimensions()),
        });
    }
    Ok(true)
}

/// Slot of the primitive's base-color image, slot 0 when it has none
fn base_color_slot(primitive: &gltf::Primitive<'_>, image_slots: &[TextureSlot]) -> TextureSlot {
    primitive
        .material()
        .pbr_metallic_roughness()
        .base_color_texture()
        .and_then(|info| image_slots.get(info.texture().source().index()).copied())
        .unwrap_or_default()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
