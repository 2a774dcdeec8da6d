//! Aspect-preserving resize math.

/// Requested output box. A missing dimension is derived from the source
/// aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeDimensions {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ResizeDimensions {
    pub fn is_noop(&self) -> bool {
        self.width.is_none() && self.height.is_none()
    }

    /// Compute the output size for a source of `src_w` x `src_h`.
    ///
    /// The image is fit within the requested box without exceeding it and
    /// without upscaling past the source. Returns `None` when no resize is
    /// needed (no dimensions requested, or the computed target equals the
    /// source).
    pub fn target_for(&self, src_w: u32, src_h: u32) -> Option<(u32, u32)> {
        if self.is_noop() || src_w == 0 || src_h == 0 {
            return None;
        }
        let aspect = src_w as f64 / src_h as f64;
        let (box_w, box_h) = match (self.width, self.height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, (w as f64 / aspect).round().max(1.0) as u32),
            (None, Some(h)) => ((h as f64 * aspect).round().max(1.0) as u32, h),
            (None, None) => unreachable!(),
        };
        // Never upscale beyond the source.
        let box_w = box_w.min(src_w);
        let box_h = box_h.min(src_h);

        let scale = (box_w as f64 / src_w as f64).min(box_h as f64 / src_h as f64);
        let out_w = ((src_w as f64 * scale).round().max(1.0)) as u32;
        let out_h = ((src_h as f64 * scale).round().max(1.0)) as u32;

        if out_w == src_w && out_h == src_h {
            None
        } else {
            Some((out_w, out_h))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: Option<u32>, height: Option<u32>) -> ResizeDimensions {
        ResizeDimensions { width, height }
    }

    #[test]
    fn test_fit_within_box() {
        // 400x200 into a 100x100 box -> 100x50
        assert_eq!(dims(Some(100), Some(100)).target_for(400, 200), Some((100, 50)));
        // 200x400 into a 100x100 box -> 50x100
        assert_eq!(dims(Some(100), Some(100)).target_for(200, 400), Some((50, 100)));
    }

    #[test]
    fn test_missing_dimension_derived_from_aspect() {
        // Only width: 400x200 at w=100 -> 100x50
        assert_eq!(dims(Some(100), None).target_for(400, 200), Some((100, 50)));
        // Only height: 400x200 at h=50 -> 100x50
        assert_eq!(dims(None, Some(50)).target_for(400, 200), Some((100, 50)));
    }

    #[test]
    fn test_never_upscales() {
        assert_eq!(dims(Some(800), Some(800)).target_for(400, 200), None);
        assert_eq!(dims(Some(800), None).target_for(400, 200), None);
    }

    #[test]
    fn test_noop() {
        assert_eq!(dims(None, None).target_for(400, 200), None);
        assert_eq!(dims(Some(400), Some(200)).target_for(400, 200), None);
    }
}
