//! toonify-export: Pure output encoders (sans-IO)
//!
//! Converts pipeline images into encoded bytes. Supports PNG and JPEG.
//! Writing the bytes anywhere is the caller's job.

pub mod raster;

pub use raster::{ExportError, OutputFormat, encode_gray, encode_rgb};
