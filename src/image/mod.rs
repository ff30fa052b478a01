//! Text-to-image generation and the in-memory gallery.

mod aspect;
mod lab;

pub use aspect::AspectRatio;
pub use lab::{download_name, GeneratedImage, ImageLab};
