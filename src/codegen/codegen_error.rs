use std::io;
use thiserror::Error;

use crate::lang::segment::Segment;

#[derive(Debug, Error)]
pub enum CodegenError {
    /// The output stream refused a write
    #[error("cannot write generated code: {0}")]
    Io(#[from] io::Error),

    /// A segment index with no cell behind it
    #[error("{segment} index {index} is out of range (0..={})", .segment.max_index())]
    IndexOutOfRange { segment: Segment, index: u16 },
}
