//! # Core Encoding Components
//!
//! Tag grammar, field resolution and the binary codec, plus UA TCP chunk
//! framing.
//!
//! ## Components
//! - **Tag**: Parses per-field directive strings
//! - **Descriptor**: Resolves a structure into an ordered field layout
//! - **Cache**: Shares resolved layouts across threads
//! - **Codec**: Encodes and decodes values driven by their layout
//! - **Bits**: Packs sub-byte fields MSB-first
//! - **Chunk**: Tokio codec for framing over byte streams
//!
//! ## Chunk Wire Format
//! ```text
//! [MessageType(3)] [ChunkType(1)] [Size(4)] [Body(N)]
//! ```

pub mod bits;
pub mod cache;
pub mod chunk;
pub mod codec;
pub mod descriptor;
pub mod macros;
pub mod tag;
