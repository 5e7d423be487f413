//! Core primitives
//!
//! - utf8: UTF-8 byte length <-> UTF-16 unit length codec and validation
//! - scanner: SIMD-accelerated tag delimiter detection using memchr
//! - attributes: lenient attribute parsing with raw value ranges
//! - entities: entity decoding with source offsets (Cow, zero-copy when possible)

pub mod attributes;
pub mod entities;
pub mod scanner;
pub mod utf8;
