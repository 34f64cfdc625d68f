/// Fatal asset import failure
///
/// Any of these aborts the import; the engine does not render partial scenes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ImportError {
    #[error("Scene file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read scene file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Malformed scene document: {0}")]
    MalformedDocument(String),

    #[error("Mesh '{mesh}' is missing required accessor {attribute}")]
    MissingAccessor { mesh: String, attribute: String },

    #[error("Mesh '{mesh}': accessor {attribute} has unsupported layout {found}")]
    UnsupportedAccessor {
        mesh: String,
        attribute: String,
        found: String,
    },

    #[error("Mesh '{mesh}': unsupported primitive mode {mode}, only triangle lists are drawn")]
    UnsupportedPrimitiveMode { mesh: String, mode: String },

    #[error("Mesh '{mesh}': unsupported index component type {found}")]
    UnsupportedIndexType { mesh: String, found: String },

    #[error("Image {image}: unsupported source ({reason})")]
    UnsupportedImageSource { image: usize, reason: String },

    #[error("Image {image}: unsupported MIME type '{mime}'")]
    UnsupportedMimeType { image: usize, mime: String },

    #[error("Image {image}: codec failure: {message}")]
    Codec { image: usize, message: String },
}
