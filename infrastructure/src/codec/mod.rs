//! Configuration codec adapters

pub mod json_codec;

pub use json_codec::JsonConfigCodec;
