use crate::error::DetectionIssue;
use serde::{Deserialize, Serialize};

/// Vehicle class as reported by the detection model, resolved once at the
/// detector boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleClass {
    Car,
    Emergency,
    /// Any other model label (pedestrians, bikes, ...). Observed but never
    /// counted towards intersection capacity.
    Other(String),
}

impl VehicleClass {
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.eq_ignore_ascii_case("car") {
            VehicleClass::Car
        } else if label.eq_ignore_ascii_case("emergency") {
            VehicleClass::Emergency
        } else {
            VehicleClass::Other(label.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            VehicleClass::Car => "Car",
            VehicleClass::Emergency => "Emergency",
            VehicleClass::Other(label) => label,
        }
    }
}

/// Axis-aligned box in frame pixels, centre-based like the model output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub cx: f32,
    pub cy: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            cx,
            cy,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: VehicleClass,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class: VehicleClass, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class,
            confidence,
            bbox,
        }
    }

    /// Builds a detection from a raw model label.
    pub fn from_label(label: &str, confidence: f32, bbox: BoundingBox) -> Self {
        Self::new(VehicleClass::from_label(label), confidence, bbox)
    }

    /// Checks the record is well formed before it is counted.
    pub fn check(&self) -> Result<(), DetectionIssue> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(DetectionIssue::ConfidenceOutOfRange(self.confidence));
        }
        let b = &self.bbox;
        if ![b.cx, b.cy, b.width, b.height].iter().all(|v| v.is_finite()) {
            return Err(DetectionIssue::NonFiniteBox);
        }
        if b.width < 0.0 || b.height < 0.0 {
            return Err(DetectionIssue::NegativeBox {
                width: b.width,
                height: b.height,
            });
        }
        Ok(())
    }
}
