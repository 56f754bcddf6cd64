use crate::model::Detection;
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

/// Box colors, keyed by `class_id % PALETTE.len()`
pub const PALETTE: [Rgba<u8>; 20] = [
    Rgba([239, 68, 68, 255]),
    Rgba([66, 153, 225, 255]),
    Rgba([5, 150, 105, 255]),
    Rgba([251, 191, 36, 255]),
    Rgba([75, 82, 177, 255]),
    Rgba([123, 58, 194, 255]),
    Rgba([237, 80, 122, 255]),
    Rgba([29, 209, 161, 255]),
    Rgba([243, 135, 58, 255]),
    Rgba([75, 85, 99, 255]),
    Rgba([220, 38, 38, 255]),
    Rgba([24, 82, 180, 255]),
    Rgba([24, 163, 93, 255]),
    Rgba([245, 158, 11, 255]),
    Rgba([64, 89, 190, 255]),
    Rgba([96, 39, 165, 255]),
    Rgba([214, 61, 96, 255]),
    Rgba([0, 172, 155, 255]),
    Rgba([230, 74, 25, 255]),
    Rgba([39, 42, 52, 255]),
];

/// A detection box in percentage-of-container geometry.
///
/// Percent units let the same overlay be drawn onto any container size
/// without recomputing from model coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBox {
    pub left_pct: f32,
    pub top_pct: f32,
    pub width_pct: f32,
    pub height_pct: f32,
    pub score: f32,
    pub class_id: u32,
}

/// Map detections to overlay geometry, dropping any below the threshold
pub fn to_overlay_boxes(
    items: &[Detection],
    input_size: (u32, u32),
    threshold: f32,
) -> Vec<OverlayBox> {
    let (input_width, input_height) = (input_size.0.max(1) as f32, input_size.1.max(1) as f32);

    items
        .iter()
        .filter(|detection| detection.score >= threshold)
        .map(|detection| OverlayBox {
            left_pct: 100.0 * detection.xmin / input_width,
            top_pct: 100.0 * detection.ymin / input_height,
            width_pct: 100.0 * (detection.xmax - detection.xmin) / input_width,
            height_pct: 100.0 * (detection.ymax - detection.ymin) / input_height,
            score: detection.score,
            class_id: detection.class_id,
        })
        .collect()
}

/// Rasterize threshold-filtered detections onto the canvas
pub fn draw_detections(
    image: &mut RgbaImage,
    items: &[Detection],
    input_size: (u32, u32),
    threshold: f32,
) {
    for overlay_box in to_overlay_boxes(items, input_size, threshold) {
        rasterize(image, &overlay_box);
    }
}

fn rasterize(image: &mut RgbaImage, overlay_box: &OverlayBox) {
    let (width, height) = (image.width() as f32, image.height() as f32);

    let x = (overlay_box.left_pct / 100.0 * width).round() as i32;
    let y = (overlay_box.top_pct / 100.0 * height).round() as i32;
    let box_width = ((overlay_box.width_pct / 100.0 * width).round() as u32).max(1);
    let box_height = ((overlay_box.height_pct / 100.0 * height).round() as u32).max(1);

    let color = PALETTE[overlay_box.class_id as usize % PALETTE.len()];
    let rect = Rect::at(x, y).of_size(box_width, box_height);

    draw_hollow_rect_mut(image, rect, color);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(score: f32, class_id: u32) -> Detection {
        Detection {
            xmin: 0.0,
            ymin: 0.0,
            xmax: 10.0,
            ymax: 10.0,
            score,
            class_id,
        }
    }

    #[test]
    fn below_threshold_detections_are_never_rendered() {
        let items = vec![
            Detection {
                xmin: 0.0,
                ymin: 0.0,
                xmax: 10.0,
                ymax: 10.0,
                score: 0.9,
                class_id: 1,
            },
            Detection {
                xmin: 0.0,
                ymin: 0.0,
                xmax: 5.0,
                ymax: 5.0,
                score: 0.1,
                class_id: 2,
            },
        ];

        let boxes = to_overlay_boxes(&items, (20, 20), 0.25);

        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].class_id, 1);
    }

    #[test]
    fn raising_threshold_shrinks_the_rendered_set() {
        let items: Vec<Detection> = [0.1, 0.3, 0.5, 0.7, 0.9]
            .iter()
            .map(|&score| detection(score, 1))
            .collect();

        let mut previous = usize::MAX;
        for threshold in [0.0, 0.2, 0.4, 0.6, 0.8, 1.0] {
            let count = to_overlay_boxes(&items, (20, 20), threshold).len();
            assert!(count <= previous);
            previous = count;
        }
        assert_eq!(previous, 1);
    }

    #[test]
    fn model_coordinates_map_to_percent_geometry() {
        let items = vec![Detection {
            xmin: 5.0,
            ymin: 10.0,
            xmax: 15.0,
            ymax: 30.0,
            score: 0.8,
            class_id: 0,
        }];

        let boxes = to_overlay_boxes(&items, (20, 40), 0.0);

        assert_eq!(boxes.len(), 1);
        assert!((boxes[0].left_pct - 25.0).abs() < 1e-4);
        assert!((boxes[0].top_pct - 25.0).abs() < 1e-4);
        assert!((boxes[0].width_pct - 50.0).abs() < 1e-4);
        assert!((boxes[0].height_pct - 50.0).abs() < 1e-4);
    }

    #[test]
    fn rasterized_box_touches_expected_pixels() {
        let mut image = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        let items = vec![Detection {
            xmin: 0.0,
            ymin: 0.0,
            xmax: 10.0,
            ymax: 10.0,
            score: 0.9,
            class_id: 1,
        }];

        draw_detections(&mut image, &items, (20, 20), 0.25);

        let expected = PALETTE[1];
        assert_eq!(*image.get_pixel(0, 0), expected);
        assert_eq!(*image.get_pixel(5, 0), expected);
        assert_eq!(*image.get_pixel(0, 5), expected);
        // Interior stays untouched
        assert_eq!(*image.get_pixel(5, 5), Rgba([0, 0, 0, 255]));
    }
}
