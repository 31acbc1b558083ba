//! Viewport indicator placement and click navigation.

use crate::dom::PageMetrics;

/// On-canvas position of the visible window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportIndicator {
    pub top: f64,
    pub height: f64,
}

/// Place the indicator for the current scroll position.
///
/// `top = scroll / document_height * canvas_height`, and the height is the
/// window's share of the document, never below `min_height`.
pub fn indicator(metrics: &PageMetrics, canvas_height: f64, min_height: f64) -> ViewportIndicator {
    if metrics.document_height <= 0.0 {
        return ViewportIndicator {
            top: 0.0,
            height: canvas_height.max(min_height),
        };
    }

    let top = (metrics.scroll_top / metrics.document_height) * canvas_height;
    let height = (metrics.window_height / metrics.document_height) * canvas_height;
    ViewportIndicator {
        top,
        height: height.max(min_height),
    }
}

/// Document scroll offset for a click `click_y` pixels below the canvas top.
pub fn scroll_target(click_y: f64, canvas_height: f64, metrics: &PageMetrics) -> f64 {
    if canvas_height <= 0.0 {
        return 0.0;
    }
    let target = (click_y / canvas_height) * metrics.document_height;
    target.clamp(0.0, metrics.max_scroll())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MIN: f64 = 8.0;

    fn metrics(scroll_top: f64, window_height: f64, document_height: f64) -> PageMetrics {
        PageMetrics {
            scroll_top,
            window_width: 1024.0,
            window_height,
            document_height,
        }
    }

    #[test]
    fn test_indicator_proportions() {
        let vp = indicator(&metrics(1000.0, 800.0, 4000.0), 320.0, MIN);
        assert!((vp.top - 80.0).abs() < 1e-9);
        assert!((vp.height - 64.0).abs() < 1e-9);
    }

    #[test]
    fn test_indicator_height_floor() {
        let vp = indicator(&metrics(0.0, 800.0, 1_000_000.0), 600.0, MIN);
        assert!((vp.height - MIN).abs() < 1e-9);
    }

    #[test]
    fn test_indicator_empty_document() {
        let vp = indicator(&metrics(0.0, 800.0, 0.0), 0.0, MIN);
        assert!(vp.top.abs() < 1e-9);
        assert!((vp.height - MIN).abs() < 1e-9);
    }

    #[test]
    fn test_scroll_target_proportion() {
        let m = metrics(0.0, 800.0, 4000.0);
        assert!((scroll_target(80.0, 320.0, &m) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_scroll_target_clamped() {
        let m = metrics(0.0, 800.0, 4000.0);
        assert!((scroll_target(320.0, 320.0, &m) - 3200.0).abs() < 1e-9);
        assert!(scroll_target(-12.0, 320.0, &m).abs() < 1e-9);
        assert!(scroll_target(50.0, 0.0, &m).abs() < 1e-9);
    }

    #[test]
    fn test_scroll_target_short_document() {
        let m = metrics(0.0, 800.0, 500.0);
        assert!(scroll_target(30.0, 40.0, &m).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_indicator_top_monotonic(
            document_height in 1000.0f64..200_000.0,
            window_height in 200.0f64..1000.0,
            canvas_height in 1.0f64..900.0,
            a in 0.0f64..1.0,
            b in 0.0f64..1.0,
        ) {
            let max_scroll = (document_height - window_height).max(0.0);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let top_lo = indicator(&metrics(lo * max_scroll, window_height, document_height), canvas_height, MIN).top;
            let top_hi = indicator(&metrics(hi * max_scroll, window_height, document_height), canvas_height, MIN).top;
            prop_assert!(top_lo <= top_hi);
        }

        #[test]
        fn prop_indicator_height_never_below_floor(
            document_height in 0.0f64..10_000_000.0,
            window_height in 0.0f64..2000.0,
            canvas_height in 0.0f64..900.0,
        ) {
            let vp = indicator(&metrics(0.0, window_height, document_height), canvas_height, MIN);
            prop_assert!(vp.height >= MIN);
        }
    }
}
