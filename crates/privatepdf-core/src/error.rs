use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrivatePdfError {
    #[error("Page number {page} is outside the accepted range [1, {page_count}]")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Failure to apply one pending form edit. Always recovered by the saver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("No form field named {0:?}")]
    NotFound(String),

    #[error("Form field {name:?} is a {found}, expected a {expected}")]
    WrongType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Option {option:?} is not available in field {name:?}")]
    UnknownOption { name: String, option: String },

    #[error("Malformed form field {name:?}: {reason}")]
    Malformed { name: String, reason: String },
}

/// Failure to turn an image payload into an embedded resource.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImageError {
    #[error("Image payload is neither a PNG nor a JPEG data URL")]
    UnsupportedType,

    #[error("Invalid base64 image payload: {0}")]
    InvalidBase64(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),
}
