//! Compression Operations

use crate::Compression;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use flate2::{Compression as GzCompression, read::GzDecoder, write::GzEncoder};
use std::io::{Read, Write};
use tracing::instrument;

impl Compression {
    /// Compress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use novelsync_compress::Compression;
    ///
    /// let data = b"{\"groups\":[],\"episodes\":[]}";
    /// let compressed = Compression::Gzip.compress(data).unwrap();
    /// assert_eq!(Compression::from_magic_bytes(&compressed), Compression::Gzip);
    /// ```
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.compress_into(input, &mut output)?;
        Ok(output)
    }

    /// Decompress a byte slice in memory.
    ///
    /// Input that does not carry the gzip magic bytes is passed through
    /// untouched when decompressing with [`Gzip`](Self::Gzip); a cache file
    /// written as plain JSON under a `.gz` name is still readable.
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.decompress_into(input, &mut output)?;
        Ok(output)
    }

    #[instrument(skip(input, output), fields(
        format = %self,
        input_size = input.len(),
        output_size
    ))]
    pub fn compress_into(&self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        let size = match self {
            Compression::None => {
                output.extend_from_slice(input);
                input.len()
            },
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(&mut *output, GzCompression::default());
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
                output.len()
            },
        };
        tracing::Span::current().record("output_size", size);
        Ok(size)
    }

    #[instrument(skip(input, output), fields(
        format = %self,
        input_size = input.len(),
        output_size
    ))]
    pub fn decompress_into(&self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        // A gzip stream under a plain name is still a gzip stream, and plain
        // JSON under a `.gz` name is still plain JSON.
        let size = match Compression::from_magic_bytes(input) {
            Compression::Gzip => {
                let mut decoder = GzDecoder::new(input);
                decoder.read_to_end(output).or_raise(|| ErrorKind::InvalidData)?
            },
            Compression::None => {
                output.extend_from_slice(input);
                input.len()
            },
        };
        tracing::Span::current().record("output_size", size);
        Ok(size)
    }
}
