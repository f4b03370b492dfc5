//! Image codec services
//!
//! - [`ImageIOService`]: decode uploads, encode results
//! - [`OutputFormatHandler`]: per-format conversion rules

pub mod format;
pub mod io;

pub use format::OutputFormatHandler;
pub use io::{EncodedImage, ImageBlob, ImageIOService};
