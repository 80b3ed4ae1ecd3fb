pub mod converter;

pub use converter::{convert_labels, DetectionBox};
