use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Stream ended unexpectedly at offset {0:#x}")]
    TruncatedStream(u64),

    #[error("Not an afxGameRecord file")]
    BadMagic,

    #[error("Version {0} is not supported")]
    UnsupportedVersion(i32),

    #[error("String starting at offset {0:#x} is not NUL-terminated")]
    UnterminatedString(u64),

    #[error("String at offset {0:#x} is not valid UTF-8")]
    InvalidEncoding(u64),

    #[error("Dictionary index {index} at offset {offset:#x} was never defined")]
    DictionaryCorruption { index: i32, offset: u64 },

    #[error("Unknown record {name:?} at offset {offset:#x}")]
    UnknownRecordType { name: String, offset: u64 },

    /// Recovered locally: the entity is dropped and decoding continues.
    #[error("Failed to import model {model:?}: {reason}")]
    ModelImportFailed { model: String, reason: String },

    #[error("Not a valid advancedfx Cam file")]
    InvalidCamFileHeader,

    #[error("Cam version {0} is not supported, only 1 - 2 are")]
    UnsupportedCamVersion(i32),

    #[error("Unsupported scaleFov value {0:?}")]
    UnsupportedScaleFovMode(String),

    #[error("Malformed number {value:?} on cam line {line}")]
    InvalidNumber { value: String, line: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
