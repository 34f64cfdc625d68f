//! Decoded texture payloads and codec dispatch
//!
//! Embedded images are dispatched by MIME type (sniffed from the header
//! bytes when the document omits it):
//!
//! | MIME            | path                                         | result             |
//! |-----------------|----------------------------------------------|--------------------|
//! | `image/png`     | `image` decoder                              | RGBA8 sRGB, 1 mip  |
//! | `image/jpeg`    | `image` decoder                              | RGBA8 sRGB, 1 mip  |
//! | `image/ktx2`    | `ktx2` container, GPU-native formats only    | as stored, all mips|
//! | `image/basis`   | Basis Universal transcoder                   | BC7 sRGB, all mips |

use super::import_error::ImportError;

/// Pixel formats the importer can hand to the GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Srgb,
    Rgba8Unorm,
    Bc1RgbaSrgb,
    Bc1RgbaUnorm,
    Bc3Srgb,
    Bc3Unorm,
    Bc5Unorm,
    Bc7Srgb,
    Bc7Unorm,
}

impl TextureFormat {
    /// Fixed target of every Basis Universal transcode
    pub const TRANSCODE_TARGET: TextureFormat = TextureFormat::Bc7Srgb;

    pub fn is_block_compressed(self) -> bool {
        !matches!(self, TextureFormat::Rgba8Srgb | TextureFormat::Rgba8Unorm)
    }

    /// Bytes for a `width` x `height` level
    pub fn level_size(self, width: u32, height: u32) -> usize {
        let (w, h) = (width.max(1) as usize, height.max(1) as usize);
        match self {
            TextureFormat::Rgba8Srgb | TextureFormat::Rgba8Unorm => w * h * 4,
            TextureFormat::Bc1RgbaSrgb | TextureFormat::Bc1RgbaUnorm => w.div_ceil(4) * h.div_ceil(4) * 8,
            _ => w.div_ceil(4) * h.div_ceil(4) * 16,
        }
    }

    fn from_ktx2(format: ktx2::Format) -> Option<Self> {
        let mapped = match format {
            ktx2::Format::R8G8B8A8_SRGB => TextureFormat::Rgba8Srgb,
            ktx2::Format::R8G8B8A8_UNORM => TextureFormat::Rgba8Unorm,
            ktx2::Format::BC1_RGBA_SRGB_BLOCK => TextureFormat::Bc1RgbaSrgb,
            ktx2::Format::BC1_RGBA_UNORM_BLOCK => TextureFormat::Bc1RgbaUnorm,
            ktx2::Format::BC3_SRGB_BLOCK => TextureFormat::Bc3Srgb,
            ktx2::Format::BC3_UNORM_BLOCK => TextureFormat::Bc3Unorm,
            ktx2::Format::BC5_UNORM_BLOCK => TextureFormat::Bc5Unorm,
            ktx2::Format::BC7_SRGB_BLOCK => TextureFormat::Bc7Srgb,
            ktx2::Format::BC7_UNORM_BLOCK => TextureFormat::Bc7Unorm,
            _ => return None,
        };
        Some(mapped)
    }
}

/// Byte range and size of one mip level inside [`DecodedTexture::data`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub offset: usize,
    pub len: usize,
}

/// Texture ready for upload: every mip level packed back to back
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTexture {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub levels: Vec<MipLevel>,
    pub data: Vec<u8>,
}

impl DecodedTexture {
    /// Single-level RGBA8 sRGB texture
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        let len = pixels.len();
        Self {
            width,
            height,
            format: TextureFormat::Rgba8Srgb,
            levels: vec![MipLevel { width, height, offset: 0, len }],
            data: pixels,
        }
    }

    /// 1x1 texture of a single color
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self::from_rgba8(1, 1, rgba.to_vec())
    }

    pub fn mip_levels(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn level_bytes(&self, level: usize) -> Option<&[u8]> {
        let mip = self.levels.get(level)?;
        self.data.get(mip.offset..mip.offset + mip.len)
    }

    /// Pack separately decoded levels into one buffer
    fn from_levels(width: u32, height: u32, format: TextureFormat, levels: Vec<Vec<u8>>) -> Self {
        let mut data = Vec::with_capacity(levels.iter().map(Vec::len).sum());
        let mut mips = Vec::with_capacity(levels.len());
        for (i, bytes) in levels.into_iter().enumerate() {
            mips.push(MipLevel {
                width: mip_extent(width, i),
                height: mip_extent(height, i),
                offset: data.len(),
                len: bytes.len(),
            });
            data.extend_from_slice(&bytes);
        }
        Self { width, height, format, levels: mips, data }
    }
}

/// Size of `extent` at mip `level`, never below 1
fn mip_extent(extent: u32, level: usize) -> u32 {
    u32::try_from(level)
        .ok()
        .and_then(|shift| extent.checked_shr(shift))
        .unwrap_or(0)
        .max(1)
}

/// A u32 extent has at most 32 mip levels
pub const MAX_MIP_LEVELS: u32 = 32;

pub const MIME_PNG: &str = "image/png";
pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_KTX2: &str = "image/ktx2";
pub const MIME_BASIS: &str = "image/basis";

const KTX2_MAGIC: [u8; 12] = [0xAB, b'K', b'T', b'X', b' ', b'2', b'0', 0xBB, 0x0D, 0x0A, 0x1A, 0x0A];

/// Guess the MIME type from the payload header
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some(MIME_PNG)
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(MIME_JPEG)
    } else if bytes.starts_with(&KTX2_MAGIC) {
        Some(MIME_KTX2)
    } else if bytes.starts_with(b"sB") {
        Some(MIME_BASIS)
    } else {
        None
    }
}

/// Decode or transcode an embedded image
///
/// `image` is the image index in the document and only used for errors.
pub fn decode_image(image: usize, mime: &str, bytes: &[u8]) -> Result<DecodedTexture, ImportError> {
    match mime {
        MIME_PNG => decode_with_image_crate(image, bytes, image::ImageFormat::Png),
        MIME_JPEG => decode_with_image_crate(image, bytes, image::ImageFormat::Jpeg),
        MIME_KTX2 => decode_ktx2(image, bytes),
        MIME_BASIS | "image/x-basis" => transcode_basis(image, bytes),
        other => Err(ImportError::UnsupportedMimeType {
            image,
            mime: other.to_string(),
        }),
    }
}

fn decode_with_image_crate(
    image: usize,
    bytes: &[u8],
    format: image::ImageFormat,
) -> Result<DecodedTexture, ImportError> {
    let decoded = image::load_from_memory_with_format(bytes, format).map_err(|e| ImportError::Codec {
        image,
        message: e.to_string(),
    })?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(DecodedTexture::from_rgba8(width, height, rgba.into_raw()))
}

fn decode_ktx2(image: usize, bytes: &[u8]) -> Result<DecodedTexture, ImportError> {
    let codec = |message: String| ImportError::Codec { image, message };

    let reader = ktx2::Reader::new(bytes).map_err(|e| codec(format!("invalid KTX2 container: {:?}", e)))?;
    let header = reader.header();

    if let Some(scheme) = header.supercompression_scheme {
        return Err(codec(format!("supercompressed KTX2 ({:?}) is not supported", scheme)));
    }
    if header.face_count > 1 || header.layer_count > 1 || header.pixel_depth > 1 {
        return Err(codec("only 2D, single-layer KTX2 textures are supported".to_string()));
    }
    let format = header
        .format
        .ok_or_else(|| codec("KTX2 without a GPU format (Basis payloads must use image/basis)".to_string()))?;
    let format = TextureFormat::from_ktx2(format).ok_or_else(|| codec(format!("unsupported KTX2 format {:?}", format)))?;

    if header.level_count > MAX_MIP_LEVELS {
        return Err(codec(format!(
            "KTX2 declares {} levels, at most {} are possible",
            header.level_count, MAX_MIP_LEVELS
        )));
    }

    let levels: Vec<Vec<u8>> = reader.levels().map(|level| level.to_vec()).collect();
    if levels.is_empty() {
        return Err(codec("KTX2 has no levels".to_string()));
    }
    for (i, level) in levels.iter().enumerate() {
        let expected = format.level_size(mip_extent(header.pixel_width, i), mip_extent(header.pixel_height, i));
        if level.len() < expected {
            return Err(codec(format!("KTX2 level {} is {} bytes, expected {}", i, level.len(), expected)));
        }
    }

    Ok(DecodedTexture::from_levels(header.pixel_width, header.pixel_height, format, levels))
}

#[cfg(feature = "basis-transcode")]
fn transcode_basis(image: usize, bytes: &[u8]) -> Result<DecodedTexture, ImportError> {
    use basis_universal::{TranscodeParameters, Transcoder, TranscoderTextureFormat};

    let codec = |message: String| ImportError::Codec { image, message };

    basis_universal::transcoder_init();
    let mut transcoder = Transcoder::new();
    if !transcoder.validate_header(bytes) {
        return Err(codec("invalid Basis Universal header".to_string()));
    }

    let level_count = transcoder.image_level_count(bytes, 0);
    let description = transcoder
        .image_level_description(bytes, 0, 0)
        .ok_or_else(|| codec("Basis file has no level 0".to_string()))?;

    transcoder
        .prepare_transcoding(bytes)
        .map_err(|_| codec("Basis transcoder rejected the payload".to_string()))?;

    let mut levels = Vec::with_capacity(level_count as usize);
    for level_index in 0..level_count {
        let level = transcoder
            .transcode_image_level(
                bytes,
                TranscoderTextureFormat::BC7_RGBA,
                TranscodeParameters {
                    image_index: 0,
                    level_index,
                    ..Default::default()
                },
            )
            .map_err(|e| codec(format!("transcoding level {} failed: {:?}", level_index, e)))?;
        levels.push(level);
    }
    transcoder.end_transcoding();

    Ok(DecodedTexture::from_levels(
        description.original_width,
        description.original_height,
        TextureFormat::TRANSCODE_TARGET,
        levels,
    ))
}

#[cfg(not(feature = "basis-transcode"))]
fn transcode_basis(image: usize, _bytes: &[u8]) -> Result<DecodedTexture, ImportError> {
    Err(ImportError::Codec {
        image,
        message: "built without the basis-transcode feature".to_string(),
    })
}
