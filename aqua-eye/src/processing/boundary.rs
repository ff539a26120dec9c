use aqua_core::{BoundingBox, DetectedObject};

/// True iff the box's bottom edge lies strictly below the boundary line
pub fn crossed(bbox: &BoundingBox, boundary_y: f32) -> bool {
    bbox.y2 > boundary_y
}

/// Frame-level flag: one crossing object is enough
pub fn frame_crossed(objects: &[DetectedObject], boundary_y: f32) -> bool {
    objects.iter().any(|obj| crossed(&obj.bbox, boundary_y))
}
