//! Payload handling module.
//!
//! Provides loading and chunking for firmware images.

pub mod image;

pub use image::{Chunk, ChunkIterator, FirmwareImage, ImageError};
