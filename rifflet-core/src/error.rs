//! Error types for the RIFF/AVI reader

use thiserror::Error;

use crate::riff::FourCC;

pub type Result<T> = std::result::Result<T, AviError>;

#[derive(Debug, Error)]
pub enum AviError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Empty stream")]
    EmptyStream,
    #[error("Not a RIFF file")]
    InvalidRiff,
    #[error("Not an AVI file (form type '{0}')")]
    InvalidForm(FourCC),
    #[error("RIFF size {declared} exceeds stream length {length}")]
    SizeExceedsLength { declared: u64, length: u64 },
    #[error("Stream of {0} bytes is beyond the 4 GiB RIFF limit")]
    FileTooLarge(u64),
    #[error("Missing required chunk: {0}")]
    MissingChunk(&'static str),
    #[error("Unexpected end of stream at {position} (need {needed} bytes)")]
    UnexpectedEof { position: u64, needed: u64 },
    #[error("Read past end of '{fourcc}' (position {position}, end {end})")]
    Overrun { fourcc: FourCC, position: u64, end: u64 },
    #[error("LIST nesting deeper than {0}")]
    ListTooDeep(usize),
    #[error("Too many LIST/JUNK headers before a data chunk (at {0})")]
    StepBudgetExhausted(u64),
    #[error("Unsupported video format: compression {compression:#x}, {bits_per_pixel} bpp")]
    UnsupportedVideo { compression: u32, bits_per_pixel: u16 },
    #[error("Stream has no usable frame rate")]
    InvalidFrameRate,
    #[error("No video stream found")]
    MissingVideoStream,
    #[error("Frame of {size} bytes exceeds buffer capacity {capacity}")]
    FrameTooLarge { size: u32, capacity: usize },
    #[error("File has been marked invalid")]
    InvalidFile,
}

impl AviError {
    /// True for errors caused by the layout of the file rather than by
    /// the format of its streams or by IO.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            AviError::EmptyStream
                | AviError::InvalidRiff
                | AviError::InvalidForm(_)
                | AviError::SizeExceedsLength { .. }
                | AviError::FileTooLarge(_)
                | AviError::MissingChunk(_)
                | AviError::UnexpectedEof { .. }
                | AviError::Overrun { .. }
                | AviError::ListTooDeep(_)
                | AviError::StepBudgetExhausted(_)
        )
    }
}
