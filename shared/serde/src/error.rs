use thiserror::Error;

/// Errors that can occur while decoding a bit stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerdeErr {
    /// Read past the end of the written bit stream. This indicates a corrupt
    /// or truncated payload: optional fields are always guarded by a presence
    /// bit, so an absent-by-design field never reads out of bounds.
    #[error("read past the end of the bit stream")]
    ReadOutOfBounds,

    /// A decoded discriminant or width does not map to any known value
    /// (SECURITY: potentially malformed or malicious packet)
    #[error("decoded an invalid value for {type_name}")]
    InvalidValue { type_name: &'static str },
}
