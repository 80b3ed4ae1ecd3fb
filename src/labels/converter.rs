//! Detection text to normalized box-format label conversion.
//!
//! The generation API answers with free text that should contain
//! `{"labels": [{"className": ..., "box2d": {"xMin", "yMin", "xMax", "yMax"}}]}`,
//! usually inside a fenced markdown block. Conversion is total: bad JSON or
//! bad boxes degrade to fewer (or zero) lines, never to an error.
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::prompt::catalog::{class_index, DETECTION_CLASSES};

/// An accepted detection: known class, normalized corners with
/// `0 <= min < max <= 1` on both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionBox {
    pub class_index: usize,
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl DetectionBox {
    /// Validate a raw box. Returns `None` for unknown classes, out-of-range
    /// coordinates and degenerate extents.
    pub fn new(class_name: &str, x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Option<Self> {
        let class_index = class_index(class_name)?;
        let in_range = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if ![x_min, y_min, x_max, y_max].into_iter().all(in_range) {
            return None;
        }
        if x_min >= x_max || y_min >= y_max {
            return None;
        }
        Some(DetectionBox { class_index, x_min, y_min, x_max, y_max })
    }

    pub fn class_name(&self) -> &'static str {
        DETECTION_CLASSES[self.class_index]
    }

    /// `classIndex xCenter yCenter width height`, six decimals.
    pub fn to_label_line(&self) -> String {
        let x_center = (self.x_min + self.x_max) / 2.0;
        let y_center = (self.y_min + self.y_max) / 2.0;
        let width = self.x_max - self.x_min;
        let height = self.y_max - self.y_min;
        format!(
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_index, x_center, y_center, width, height
        )
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"```([A-Za-z0-9_+-]*)[ \t]*\r?\n?([\s\S]*?)```").expect("static fence pattern")
    })
}

/// The JSON payload: the first `json`-tagged fenced block's body, else the
/// first untagged fenced block's body, otherwise the whole text. Blocks
/// tagged with another language never count.
pub fn extract_payload(text: &str) -> &str {
    let mut untagged = None;
    for caps in fence_regex().captures_iter(text) {
        let (Some(tag), Some(body)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        if tag.as_str().eq_ignore_ascii_case("json") {
            return body.as_str().trim();
        }
        if tag.as_str().is_empty() && untagged.is_none() {
            untagged = Some(body.as_str().trim());
        }
    }
    untagged.unwrap_or(text)
}

/// Parse every acceptable box out of a detection response.
pub fn parse_boxes(text: &str) -> Vec<DetectionBox> {
    let payload = extract_payload(text);
    let root: Value = match serde_json::from_str(payload.trim()) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse detection labels, raw text: {}", text);
            return Vec::new();
        }
    };
    let Some(entries) = root.get("labels").and_then(|v| v.as_array()) else {
        tracing::debug!("Detection response has no labels array");
        return Vec::new();
    };
    entries.iter().filter_map(parse_entry).collect()
}

fn parse_entry(entry: &Value) -> Option<DetectionBox> {
    let class_name = entry.get("className")?.as_str()?;
    if class_index(class_name).is_none() {
        tracing::debug!("Dropping box with unknown class '{}'", class_name);
        return None;
    }
    let b = entry.get("box2d")?;
    let coord = |key: &str| b.get(key).and_then(|v| v.as_f64());
    let parsed = match (coord("xMin"), coord("yMin"), coord("xMax"), coord("yMax")) {
        (Some(x0), Some(y0), Some(x1), Some(y1)) => DetectionBox::new(class_name, x0, y0, x1, y1),
        _ => None,
    };
    if parsed.is_none() {
        tracing::warn!("Invalid bounding box received: {}", b);
    }
    parsed
}

/// Convert a detection response into label-file text: one line per accepted
/// box, newline separated, possibly empty.
pub fn convert_labels(text: &str) -> String {
    parse_boxes(text)
        .iter()
        .map(DetectionBox::to_label_line)
        .collect::<Vec<_>>()
        .join("\n")
}
