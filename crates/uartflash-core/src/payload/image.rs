//! Firmware image loading and chunking.
//!
//! The image is read once, kept immutable for the whole transfer and
//! walked in 256-byte chunks. The final chunk may be short; padding is
//! applied by the frame codec.

use std::path::Path;

use thiserror::Error;

use crate::protocol::constants::CHUNK_SIZE;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Image is empty")]
    Empty,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Immutable image to upload.
#[derive(Debug, Clone)]
pub struct FirmwareImage {
    data: Vec<u8>,
}

impl FirmwareImage {
    /// Wrap raw bytes. Empty images are rejected.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ImageError> {
        if data.is_empty() {
            return Err(ImageError::Empty);
        }
        Ok(Self { data })
    }

    /// Read an image file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ImageError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    /// Number of chunks: `ceil(len / 256)`.
    pub fn chunk_count(&self) -> usize {
        self.data.len().div_ceil(CHUNK_SIZE)
    }

    /// Iterate over the image in 256-byte chunks.
    pub fn chunks(&self) -> ChunkIterator<'_> {
        ChunkIterator::new(&self.data, CHUNK_SIZE)
    }

    /// Get raw data.
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    /// Get total size.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false for a constructed image.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One slice of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// 0-based chunk index.
    pub index: usize,
    /// Byte offset of this chunk in the image.
    pub offset: usize,
    /// Up to 256 bytes of image data.
    pub data: &'a [u8],
    /// Last chunk of the image.
    pub is_last: bool,
}

/// Iterator over fixed-size chunks with a short tail.
#[derive(Debug)]
pub struct ChunkIterator<'a> {
    data: &'a [u8],
    chunk_size: usize,
    offset: usize,
    current_chunk: usize,
}

impl<'a> ChunkIterator<'a> {
    pub fn new(data: &'a [u8], chunk_size: usize) -> Self {
        Self {
            data,
            chunk_size,
            offset: 0,
            current_chunk: 0,
        }
    }

    /// Get total number of chunks (including partial).
    pub fn total(&self) -> usize {
        self.data.len().div_ceil(self.chunk_size)
    }

    /// Index of the next chunk to be yielded.
    pub fn current(&self) -> usize {
        self.current_chunk
    }

    /// Check if the next chunk is the last one.
    pub fn is_last(&self) -> bool {
        self.current_chunk + 1 >= self.total()
    }
}

impl<'a> Iterator for ChunkIterator<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }

        let remaining = self.data.len() - self.offset;
        let chunk_len = remaining.min(self.chunk_size);

        let chunk = Chunk {
            index: self.current_chunk,
            offset: self.offset,
            data: &self.data[self.offset..self.offset + chunk_len],
            is_last: self.offset + chunk_len >= self.data.len(),
        };
        self.offset += chunk_len;
        self.current_chunk += 1;

        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total() - self.current_chunk;
        (left, Some(left))
    }
}

impl ExactSizeIterator for ChunkIterator<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequential(len: usize) -> FirmwareImage {
        FirmwareImage::from_bytes((0..len).map(|i| i as u8).collect()).unwrap()
    }

    #[test]
    fn test_empty_image_rejected() {
        assert!(matches!(
            FirmwareImage::from_bytes(Vec::new()),
            Err(ImageError::Empty)
        ));
    }

    #[test]
    fn test_chunk_count_is_ceiling() {
        for (len, expected) in [(1, 1), (255, 1), (256, 1), (257, 2), (300, 2), (512, 2), (1025, 5)] {
            let image = sequential(len);
            assert_eq!(image.chunk_count(), expected, "len {}", len);
            assert_eq!(image.chunks().count(), expected, "len {}", len);
        }
    }

    #[test]
    fn test_chunk_iterator() {
        let image = sequential(300);
        let iter = image.chunks();
        assert_eq!(iter.total(), 2);
        assert_eq!(iter.len(), 2);

        let chunks: Vec<_> = image.chunks().collect();
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].data.len(), 256);
        assert!(!chunks[0].is_last);

        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].offset, 256);
        assert_eq!(chunks[1].data.len(), 44);
        assert_eq!(chunks[1].data[0], 0); // 256 as u8
        assert!(chunks[1].is_last);
    }

    #[test]
    fn test_exact_multiple_last_chunk() {
        let image = sequential(512);
        let chunks: Vec<_> = image.chunks().collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].data.len(), 256);
        assert!(chunks[1].is_last);
    }

    #[test]
    fn test_iterator_position() {
        let image = sequential(600);
        let mut iter = image.chunks();
        assert_eq!(iter.current(), 0);
        assert!(!iter.is_last());
        iter.next();
        iter.next();
        assert_eq!(iter.current(), 2);
        assert!(iter.is_last());
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let err = FirmwareImage::load("/nonexistent/uartflash/image.bin").unwrap_err();
        assert!(matches!(err, ImageError::Io(_)));
    }
}
