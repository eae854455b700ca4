use super::types::{Detection, VehicleClass};
use crate::config::RegionOfInterest;
use crate::error::DetectionIssue;
use serde::{Deserialize, Serialize};

/// Per-cycle class counts. The capacity total is always derived from the
/// car and emergency counts and is never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleTally {
    pub car_count: u32,
    pub emergency_count: u32,
    pub other_count: u32,
}

impl VehicleTally {
    pub fn new(car_count: u32, emergency_count: u32) -> Self {
        Self {
            car_count,
            emergency_count,
            other_count: 0,
        }
    }

    pub fn total(&self) -> u32 {
        self.car_count + self.emergency_count
    }

    pub fn has_emergency(&self) -> bool {
        self.emergency_count > 0
    }
}

/// Ingestion settings applied before counting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngestFilter {
    pub confidence_threshold: f32,
    pub region_of_interest: Option<RegionOfInterest>,
}

impl Default for IngestFilter {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.0,
            region_of_interest: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TallyReport {
    pub tally: VehicleTally,
    /// Malformed detections that were dropped, in input order.
    pub dropped: Vec<DetectionIssue>,
    /// Well-formed detections skipped for low confidence or position.
    pub filtered: u32,
}

/// Reduces one detection cycle to class counts. Malformed detections are
/// dropped and reported, never fatal.
pub fn tally_detections(detections: &[Detection], filter: &IngestFilter) -> TallyReport {
    let mut report = TallyReport::default();

    for detection in detections {
        if let Err(issue) = detection.check() {
            report.dropped.push(issue);
            continue;
        }
        if detection.confidence < filter.confidence_threshold {
            report.filtered += 1;
            continue;
        }
        if let Some(roi) = filter.region_of_interest {
            if !roi.contains(detection.bbox.cx, detection.bbox.cy) {
                report.filtered += 1;
                continue;
            }
        }

        match detection.class {
            VehicleClass::Car => report.tally.car_count += 1,
            VehicleClass::Emergency => report.tally.emergency_count += 1,
            VehicleClass::Other(_) => report.tally.other_count += 1,
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::BoundingBox;

    fn det(label: &str, conf: f32) -> Detection {
        Detection::from_label(label, conf, BoundingBox::new(50.0, 50.0, 20.0, 10.0))
    }

    #[test]
    fn counts_cars_and_emergency_vehicles() {
        let detections = vec![
            det("Car", 0.9),
            det("Car", 0.8),
            det("Emergency", 0.7),
            det("person", 0.95),
        ];
        let report = tally_detections(&detections, &IngestFilter::default());
        assert_eq!(report.tally.car_count, 2);
        assert_eq!(report.tally.emergency_count, 1);
        assert_eq!(report.tally.other_count, 1);
        assert_eq!(report.tally.total(), 3);
        assert!(report.tally.has_emergency());
        assert!(report.dropped.is_empty());
    }

    #[test]
    fn malformed_detections_are_dropped_not_fatal() {
        let mut bad_box = det("Car", 0.9);
        bad_box.bbox.height = -2.0;
        let detections = vec![det("Car", 1.7), bad_box, det("Car", 0.6)];

        let report = tally_detections(&detections, &IngestFilter::default());
        assert_eq!(report.tally.total(), 1);
        assert!(!report.tally.has_emergency());
        assert_eq!(report.dropped.len(), 2);
    }

    #[test]
    fn low_confidence_is_filtered_silently() {
        let filter = IngestFilter {
            confidence_threshold: 0.4,
            region_of_interest: None,
        };
        let report = tally_detections(&[det("Car", 0.3), det("Car", 0.4)], &filter);
        assert_eq!(report.tally.car_count, 1);
        assert_eq!(report.filtered, 1);
        assert!(report.dropped.is_empty());
    }

    #[test]
    fn region_of_interest_excludes_outside_boxes() {
        let filter = IngestFilter {
            confidence_threshold: 0.0,
            region_of_interest: Some(RegionOfInterest {
                x: 0.0,
                y: 0.0,
                width: 40.0,
                height: 40.0,
            }),
        };
        let inside = Detection::from_label("Car", 0.9, BoundingBox::new(20.0, 20.0, 5.0, 5.0));
        let outside = det("Car", 0.9);
        let report = tally_detections(&[inside, outside], &filter);
        assert_eq!(report.tally.car_count, 1);
        assert_eq!(report.filtered, 1);
    }

    #[test]
    fn empty_cycle_yields_zero_tally() {
        let report = tally_detections(&[], &IngestFilter::default());
        assert_eq!(report.tally, VehicleTally::default());
    }
}
