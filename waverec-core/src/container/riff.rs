//! RIFF/WAV container header layout.
//!
//! The header is written twice per file: once at stream start with a zero
//! data size so the file is loadable even if the process dies, and once at
//! finalize with the real sizes. Only the two size fields differ between
//! the writes; the layout itself is fixed at format time.

use crate::models::format::MixFormat;

/// Byte offset of the RIFF chunk size field.
pub const RIFF_SIZE_OFFSET: u64 = 4;

/// Fixed-layout prefix of a streaming WAV file.
///
/// ```text
/// [0-3]        "RIFF"
/// [4-7]        riff size = 4 + (8 + fmt_len) + (8 + data_size)
/// [8-11]       "WAVE"
/// [12-15]      "fmt "
/// [16-19]      fmt_len (18 + extension)
/// [20..]       wave format descriptor (MixFormat::encode)
/// [20+fmt_len..]   "data"
/// [24+fmt_len..]   data_size
/// ```
///
/// The `fmt ` payload is a verbatim copy of the device's native format
/// descriptor, extension blob included, so players negotiate exactly what
/// the endpoint produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiffWavHeader {
    format: MixFormat,
}

impl RiffWavHeader {
    pub fn new(format: MixFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> &MixFormat {
        &self.format
    }

    /// Total header length; identical for the placeholder and final writes.
    pub fn byte_len(&self) -> usize {
        12 + 8 + self.format.encoded_len() + 8
    }

    /// Byte offset of the data sub-chunk size field.
    pub fn data_size_offset(&self) -> u64 {
        12 + 8 + self.format.encoded_len() as u64 + 4
    }

    /// Encode the full header with the given data sub-chunk size.
    pub fn encode(&self, data_size: u32) -> Vec<u8> {
        let fmt_bytes = self.format.encode();
        let fmt_len = fmt_bytes.len() as u32;
        let riff_size = 4 + (8 + fmt_len) + (8 + data_size);

        let mut out = Vec::with_capacity(self.byte_len());
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&riff_size.to_le_bytes());
        out.extend_from_slice(b"WAVE");

        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&fmt_len.to_le_bytes());
        out.extend_from_slice(&fmt_bytes);

        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_size.to_le_bytes());
        out
    }
}
