use serde::{Deserialize, Serialize};

use crate::ocr::BoundingBox;

/// Reference page size, in points, that OCR coordinates are scaled against.
///
/// This is data, not a constant: Letter (612x792) is only the default the
/// config supplies, and a document whose MediaBox says otherwise passes its
/// own reference through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageReference {
    pub width_pts: f64,
    pub height_pts: f64,
}

impl PageReference {
    pub const US_LETTER: PageReference = PageReference {
        width_pts: 612.0,
        height_pts: 792.0,
    };

    pub fn new(width_pts: f64, height_pts: f64) -> Self {
        Self {
            width_pts,
            height_pts,
        }
    }

    fn is_measurable(&self) -> bool {
        self.width_pts > 0.0 && self.height_pts > 0.0
    }
}

/// On-screen pixel rectangle of the currently rendered page, as reported
/// by the render surface. Read-only here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    pub width_px: f64,
    pub height_px: f64,
    pub offset_left: f64,
    pub offset_top: f64,
}

impl PageMetrics {
    pub fn new(width_px: f64, height_px: f64) -> Self {
        Self {
            width_px,
            height_px,
            offset_left: 0.0,
            offset_top: 0.0,
        }
    }

    fn is_measurable(&self) -> bool {
        self.width_px > 0.0 && self.height_px > 0.0
    }
}

/// Rectangle in absolute pixels relative to the page origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Rectangle as percentages of the rendered page rectangle.
///
/// Percentages re-flow automatically when the page rectangle resizes on
/// zoom, so the transform does not need to re-run on scale changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayRect {
    pub left_pct: f64,
    pub top_pct: f64,
    pub width_pct: f64,
    pub height_pct: f64,
}

/// Outcome of placing an OCR box onto the rendered page
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayPlacement {
    /// Page element not measurable yet; the overlay stays hidden
    NotVisible,
    Visible {
        pixels: PixelRect,
        percent: OverlayRect,
    },
}

impl OverlayPlacement {
    pub fn is_visible(&self) -> bool {
        matches!(self, OverlayPlacement::Visible { .. })
    }

    pub fn percent(&self) -> Option<OverlayRect> {
        match self {
            OverlayPlacement::Visible { percent, .. } => Some(*percent),
            OverlayPlacement::NotVisible => None,
        }
    }
}

/// Convert an OCR-unit box to 72-dpi points.
///
/// `unit_scale` fixes the assumed input unit explicitly: 72.0 when the
/// backend reports inches, 1.0 when it already reports points. Origin is
/// top-left, no Y flip.
pub fn to_page_points(bbox: &BoundingBox, unit_scale: f64) -> PixelRect {
    PixelRect {
        left: bbox.x_min * unit_scale,
        top: bbox.y_min * unit_scale,
        width: bbox.width() * unit_scale,
        height: bbox.height() * unit_scale,
    }
}

/// Project an OCR-unit box onto the rendered page, in pixels.
///
/// X and Y are scaled independently so a page stretched off-ratio by the
/// render surface still lines up.
pub fn project(
    bbox: &BoundingBox,
    reference: PageReference,
    metrics: PageMetrics,
    unit_scale: f64,
) -> PixelRect {
    let points = to_page_points(bbox, unit_scale);

    let scale_x = metrics.width_px / reference.width_pts;
    let scale_y = metrics.height_px / reference.height_pts;

    PixelRect {
        left: points.left * scale_x,
        top: points.top * scale_y,
        width: points.width * scale_x,
        height: points.height * scale_y,
    }
}

/// Express a projected box as a padded, clamped percentage rectangle.
///
/// The padding expands the box outward by `padding_pct` of the page
/// dimension on each side; every edge is then clamped into [0, 100] so the
/// highlight never overflows the page rectangle.
pub fn overlay_rect(
    bbox: &BoundingBox,
    reference: PageReference,
    metrics: PageMetrics,
    unit_scale: f64,
    padding_pct: f64,
) -> OverlayRect {
    let pixels = project(bbox, reference, metrics, unit_scale);

    let left = (pixels.left / metrics.width_px) * 100.0 - padding_pct;
    let top = (pixels.top / metrics.height_px) * 100.0 - padding_pct;
    let right = ((pixels.left + pixels.width) / metrics.width_px) * 100.0 + padding_pct;
    let bottom = ((pixels.top + pixels.height) / metrics.height_px) * 100.0 + padding_pct;

    let left = left.clamp(0.0, 100.0);
    let top = top.clamp(0.0, 100.0);
    let right = right.clamp(0.0, 100.0);
    let bottom = bottom.clamp(0.0, 100.0);

    OverlayRect {
        left_pct: left,
        top_pct: top,
        width_pct: (right - left).max(0.0),
        height_pct: (bottom - top).max(0.0),
    }
}

/// Full placement: pixel rect plus percentage rect, or NotVisible when the
/// page element cannot be measured yet. Never panics, never returns a
/// zero-sized stand-in for a missing page.
pub fn place(
    bbox: &BoundingBox,
    reference: PageReference,
    metrics: Option<PageMetrics>,
    unit_scale: f64,
    padding_pct: f64,
) -> OverlayPlacement {
    let metrics = match metrics {
        Some(m) if m.is_measurable() && reference.is_measurable() => m,
        _ => return OverlayPlacement::NotVisible,
    };

    OverlayPlacement::Visible {
        pixels: project(bbox, reference, metrics, unit_scale),
        percent: overlay_rect(bbox, reference, metrics, unit_scale, padding_pct),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> BoundingBox {
        BoundingBox::new(x_min, y_min, x_max, y_max)
    }

    #[test]
    fn test_identity_scale_matches_point_conversion() {
        // Rendered at exactly the reference size, pixels == points
        let metrics = PageMetrics::new(612.0, 792.0);
        let b = bbox(1.0, 1.0, 3.0, 1.5);

        let projected = project(&b, PageReference::US_LETTER, metrics, 72.0);
        assert_eq!(projected.left, 72.0);
        assert_eq!(projected.top, 72.0);
        assert_eq!(projected.width, 144.0);
        assert_eq!(projected.height, 36.0);
    }

    #[test]
    fn test_independent_axis_scaling() {
        // Page rendered at double width, normal height
        let metrics = PageMetrics::new(1224.0, 792.0);
        let b = bbox(1.0, 1.0, 2.0, 2.0);

        let projected = project(&b, PageReference::US_LETTER, metrics, 72.0);
        assert_eq!(projected.left, 144.0);
        assert_eq!(projected.top, 72.0);
        assert_eq!(projected.width, 144.0);
        assert_eq!(projected.height, 72.0);
    }

    #[test]
    fn test_unit_scale_one_is_identity() {
        let metrics = PageMetrics::new(612.0, 792.0);
        let b = bbox(10.0, 20.0, 110.0, 50.0);

        let projected = project(&b, PageReference::US_LETTER, metrics, 1.0);
        assert_eq!(projected.left, 10.0);
        assert_eq!(projected.top, 20.0);
        assert_eq!(projected.width, 100.0);
        assert_eq!(projected.height, 30.0);
    }

    #[test]
    fn test_overlay_rect_applies_padding() {
        let metrics = PageMetrics::new(612.0, 792.0);
        let b = bbox(1.0, 1.0, 3.0, 1.5);

        let rect = overlay_rect(&b, PageReference::US_LETTER, metrics, 72.0, 0.2);

        let expected_left = (72.0 / 612.0) * 100.0 - 0.2;
        let expected_top = (72.0 / 792.0) * 100.0 - 0.2;
        assert!((rect.left_pct - expected_left).abs() < 1e-9);
        assert!((rect.top_pct - expected_top).abs() < 1e-9);

        // Width grew by padding on both sides
        let unpadded_width = (144.0 / 612.0) * 100.0;
        assert!((rect.width_pct - (unpadded_width + 0.4)).abs() < 1e-9);
    }

    #[test]
    fn test_clamping_never_leaves_page() {
        let metrics = PageMetrics::new(612.0, 792.0);
        // Box hugging the bottom-right corner of the page
        let b = bbox(8.3, 10.8, 8.6, 11.1);

        let rect = overlay_rect(&b, PageReference::US_LETTER, metrics, 72.0, 5.0);
        assert!(rect.left_pct >= 0.0);
        assert!(rect.top_pct >= 0.0);
        assert!(rect.left_pct + rect.width_pct <= 100.0);
        assert!(rect.top_pct + rect.height_pct <= 100.0);
    }

    #[test]
    fn test_clamping_negative_origin() {
        let metrics = PageMetrics::new(612.0, 792.0);
        let b = bbox(0.0, 0.0, 0.5, 0.5);

        let rect = overlay_rect(&b, PageReference::US_LETTER, metrics, 72.0, 2.0);
        assert_eq!(rect.left_pct, 0.0);
        assert_eq!(rect.top_pct, 0.0);
    }

    #[test]
    fn test_missing_metrics_is_not_visible() {
        let b = bbox(1.0, 1.0, 2.0, 2.0);
        let placement = place(&b, PageReference::US_LETTER, None, 72.0, 0.2);
        assert_eq!(placement, OverlayPlacement::NotVisible);
    }

    #[test]
    fn test_unmeasurable_page_is_not_visible() {
        let b = bbox(1.0, 1.0, 2.0, 2.0);
        let placement = place(
            &b,
            PageReference::US_LETTER,
            Some(PageMetrics::new(0.0, 0.0)),
            72.0,
            0.2,
        );
        assert_eq!(placement, OverlayPlacement::NotVisible);
    }

    #[test]
    fn test_custom_reference_size() {
        // A4 page rendered 1:1
        let a4 = PageReference::new(595.0, 842.0);
        let metrics = PageMetrics::new(595.0, 842.0);
        let b = bbox(1.0, 1.0, 2.0, 2.0);

        let projected = project(&b, a4, metrics, 72.0);
        assert_eq!(projected.left, 72.0);
        assert_eq!(projected.width, 72.0);
    }
}
