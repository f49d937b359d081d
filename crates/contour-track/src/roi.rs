//! Region-of-interest planning around the last known face box.

use contour_core::BoundingBox;
use image::RgbImage;

/// An ROI covering this fraction of either frame dimension is no cheaper
/// than a full-frame pass.
pub const FULL_FRAME_FRACTION: f64 = 0.8;

/// Where the next detection should look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchArea {
    FullFrame,
    Region(BoundingBox),
}

/// ROI for re-detection: `last` scaled by `expansion` about its center.
pub fn detection_area(last: &BoundingBox, expansion: f64, width: u32, height: u32) -> SearchArea {
    let margin = expansion - 1.0;
    clamp_to_frame(
        last.x as f64 - last.width as f64 * margin / 2.0,
        last.y as f64 - last.height as f64 * margin / 2.0,
        last.width as f64 * expansion,
        last.height as f64 * expansion,
        width,
        height,
    )
}

/// ROI for recovery: a wider window that grows with `expansion`.
pub fn recovery_area(last: &BoundingBox, expansion: f64, width: u32, height: u32) -> SearchArea {
    let margin = expansion - 1.0;
    clamp_to_frame(
        last.x as f64 - last.width as f64 * margin,
        last.y as f64 - last.height as f64 * margin,
        last.width as f64 * expansion * 2.0,
        last.height as f64 * expansion * 2.0,
        width,
        height,
    )
}

fn clamp_to_frame(x: f64, y: f64, w: f64, h: f64, width: u32, height: u32) -> SearchArea {
    let (fw, fh) = (width as i64, height as i64);
    if fw == 0 || fh == 0 || !(x.is_finite() && y.is_finite() && w.is_finite() && h.is_finite()) {
        return SearchArea::FullFrame;
    }

    let roi_x = (x as i64).max(0);
    let roi_y = (y as i64).max(0);
    let roi_w = (w as i64).min(fw - roi_x);
    let roi_h = (h as i64).min(fh - roi_y);

    if roi_w <= 0 || roi_h <= 0 {
        return SearchArea::FullFrame;
    }
    if roi_w as f64 >= fw as f64 * FULL_FRAME_FRACTION || roi_h as f64 >= fh as f64 * FULL_FRAME_FRACTION {
        return SearchArea::FullFrame;
    }

    SearchArea::Region(BoundingBox::new(
        roi_x as i32,
        roi_y as i32,
        roi_w as i32,
        roi_h as i32,
    ))
}

/// Copy out `roi`, or `None` if it is empty or does not overlap the image.
pub fn crop(image: &RgbImage, roi: &BoundingBox) -> Option<RgbImage> {
    if roi.is_empty() {
        return None;
    }
    let (w, h) = image.dimensions();
    let x2 = roi.x.saturating_add(roi.width);
    let y2 = roi.y.saturating_add(roi.height);
    if x2 <= 0 || y2 <= 0 {
        return None;
    }
    let x = roi.x.max(0) as u32;
    let y = roi.y.max(0) as u32;
    if x >= w || y >= h {
        return None;
    }
    let cw = (x2 as u32).min(w).saturating_sub(x);
    let ch = (y2 as u32).min(h).saturating_sub(y);
    if cw == 0 || ch == 0 {
        return None;
    }
    Some(image::imageops::crop_imm(image, x, y, cw, ch).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_detection_area_centered() {
        let area = detection_area(&BoundingBox::new(200, 150, 100, 100), 1.3, 640, 480);
        assert_eq!(area, SearchArea::Region(BoundingBox::new(185, 135, 130, 130)));
    }

    #[test]
    fn test_detection_area_clamped_at_edge() {
        let area = detection_area(&BoundingBox::new(0, 0, 100, 100), 1.3, 640, 480);
        assert_eq!(area, SearchArea::Region(BoundingBox::new(0, 0, 130, 130)));
    }

    #[test]
    fn test_large_area_falls_back_to_full_frame() {
        // 1.3 × 300 = 390 px tall ≥ 0.8 × 480.
        let area = detection_area(&BoundingBox::new(100, 50, 300, 300), 1.3, 640, 480);
        assert_eq!(area, SearchArea::FullFrame);
    }

    #[test]
    fn test_recovery_area_grows_with_expansion() {
        let last = BoundingBox::new(300, 200, 60, 60);
        let SearchArea::Region(small) = recovery_area(&last, 1.2, 640, 480) else {
            panic!("expected region");
        };
        let SearchArea::Region(large) = recovery_area(&last, 1.6, 640, 480) else {
            panic!("expected region");
        };
        assert!(large.area() > small.area());
        assert_eq!(small, BoundingBox::new(288, 188, 144, 144));
    }

    #[test]
    fn test_recovery_near_edge_falls_back() {
        let last = BoundingBox::new(300, 250, 200, 200);
        assert_eq!(recovery_area(&last, 2.0, 640, 480), SearchArea::FullFrame);
    }

    #[test]
    fn test_box_outside_frame() {
        let area = detection_area(&BoundingBox::new(900, 900, 50, 50), 1.3, 640, 480);
        assert_eq!(area, SearchArea::FullFrame);
    }

    #[test]
    fn test_crop() {
        let img = RgbImage::from_fn(20, 10, |x, y| Rgb([x as u8, y as u8, 0]));
        let c = crop(&img, &BoundingBox::new(5, 2, 4, 3)).unwrap();
        assert_eq!(c.dimensions(), (4, 3));
        assert_eq!(c.get_pixel(0, 0).0, [5, 2, 0]);

        let clipped = crop(&img, &BoundingBox::new(18, 8, 10, 10)).unwrap();
        assert_eq!(clipped.dimensions(), (2, 2));
        assert!(crop(&img, &BoundingBox::new(-10, -10, 5, 5)).is_none());
    }

    #[test]
    fn test_crop_degenerate_roi_is_none() {
        let img = RgbImage::new(100, 100);
        assert!(crop(&img, &BoundingBox::new(10, 10, -5, 20)).is_none());
        assert!(crop(&img, &BoundingBox::new(10, 10, 20, -5)).is_none());
        assert!(crop(&img, &BoundingBox::new(10, 10, 0, 20)).is_none());
        assert!(crop(&img, &BoundingBox::new(i32::MAX - 1, 10, i32::MAX, 20)).is_none());
        assert_eq!(
            crop(&img, &BoundingBox::new(90, 90, i32::MAX, i32::MAX)).unwrap().dimensions(),
            (10, 10)
        );
    }
}
