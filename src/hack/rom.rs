use crate::hack::hack_error::HackError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An assembled program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rom {
    /// Machine words; `words[0]` is the entry point.
    pub words: Vec<u16>,

    /// User symbols (labels and variables) resolved during assembly.
    pub symbols: BTreeMap<String, u16>,
}

impl Rom {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn address_of(&self, symbol: &str) -> Option<u16> {
        self.symbols.get(symbol).copied()
    }

    /// Compact binary image, suitable for writing to disk.
    pub fn to_image(&self) -> Result<Vec<u8>, HackError> {
        Ok(postcard::to_allocvec(self)?)
    }

    #[cfg(test)]
    pub fn from_image(bytes: &[u8]) -> Result<Rom, HackError> {
        Ok(postcard::from_bytes(bytes)?)
    }
}
