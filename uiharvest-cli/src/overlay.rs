//! Screenshot overlays: element outlines drawn on top of a capture, one
//! color per tree depth.

use crate::errors::ClientError;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use tracing::debug;
use uiharvest::{Rect, UINode};

/// Control types outlined in overlays. Broader than the clickable set so
/// text and containers are visible too.
pub const OVERLAY_CONTROL_TYPES: &[&str] = &[
    "ButtonControl",
    "CheckBoxControl",
    "ComboBoxControl",
    "ScrollBarControl",
    "RadioButtonControl",
    "HyperlinkControl",
    "MenuItemControl",
    "PaneControl",
    "TextControl",
    "TreeItemControl",
    "JavaControl",
    "SwingControl",
    "UwpButton",
    "UwpText",
];

const DEPTH_COLORS: [Rgb<u8>; 6] = [
    Rgb([255, 0, 0]),
    Rgb([0, 255, 0]),
    Rgb([0, 0, 255]),
    Rgb([255, 255, 0]),
    Rgb([255, 0, 255]),
    Rgb([0, 255, 255]),
];

pub fn depth_color(depth: usize) -> Rgb<u8> {
    DEPTH_COLORS[depth % DEPTH_COLORS.len()]
}

fn fits(rect: &Rect, width: u32, height: u32) -> bool {
    rect.left >= 0
        && rect.top >= 0
        && rect.has_area()
        && rect.right < width as i32
        && rect.bottom < height as i32
}

fn outline(image: &mut RgbImage, rect: &Rect, color: Rgb<u8>) {
    let (left, top, right, bottom) = (
        rect.left as u32,
        rect.top as u32,
        rect.right as u32,
        rect.bottom as u32,
    );
    for x in left..=right {
        image.put_pixel(x, top, color);
        image.put_pixel(x, bottom, color);
    }
    for y in top..=bottom {
        image.put_pixel(left, y, color);
        image.put_pixel(right, y, color);
    }
}

/// Draw outlines onto `image`; returns how many elements were drawn.
/// Elements outside the image are skipped, their children are not.
pub fn draw_tree(image: &mut RgbImage, root: &UINode) -> usize {
    let (width, height) = image.dimensions();
    let mut drawn = 0;
    for node in root.walk() {
        let Some(props) = node.element.properties() else {
            continue;
        };
        if props.is_offscreen || !OVERLAY_CONTROL_TYPES.contains(&props.control_type.as_str()) {
            continue;
        }
        if !fits(&props.rect, width, height) {
            debug!("Skipping element with out-of-bounds coordinates: {:?}", props.rect);
            continue;
        }
        outline(image, &props.rect, depth_color(node.depth));
        drawn += 1;
    }
    drawn
}

/// Decode a PNG capture, outline the tree on it and re-encode it.
pub fn render(png: &[u8], root: &UINode) -> Result<Vec<u8>, ClientError> {
    let mut image = image::load_from_memory_with_format(png, ImageFormat::Png)
        .map_err(|e| ClientError::Artifact(format!("Cannot decode screenshot: {e}")))?
        .to_rgb8();
    let drawn = draw_tree(&mut image, root);
    debug!("Overlay: {} elements outlined", drawn);

    let mut out = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| ClientError::Artifact(format!("Cannot encode overlay: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uiharvest::tree::ElementProperties;
    use uiharvest::NodeElement;

    fn node(depth: usize, control_type: &str, rect: Rect, children: Vec<UINode>) -> UINode {
        UINode {
            depth,
            element: NodeElement::Readable(ElementProperties {
                name: control_type.to_string(),
                control_type: control_type.to_string(),
                automation_id: String::new(),
                is_enabled: true,
                is_offscreen: false,
                is_focusable: false,
                rect,
                clickable: None,
            }),
            children,
        }
    }

    #[test]
    fn test_outlines_are_colored_by_depth() {
        let tree = node(
            0,
            "PaneControl",
            Rect::new(0, 0, 19, 19),
            vec![node(1, "ButtonControl", Rect::new(5, 5, 10, 10), vec![])],
        );
        let mut image = RgbImage::new(20, 20);
        assert_eq!(draw_tree(&mut image, &tree), 2);
        assert_eq!(*image.get_pixel(0, 0), depth_color(0));
        assert_eq!(*image.get_pixel(5, 5), depth_color(1));
        assert_eq!(*image.get_pixel(7, 7), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_out_of_bounds_parent_keeps_children() {
        let tree = node(
            0,
            "PaneControl",
            Rect::new(-8, -8, 1920, 1080),
            vec![
                node(1, "ButtonControl", Rect::new(2, 2, 6, 6), vec![]),
                node(1, "EditControl", Rect::new(2, 2, 6, 6), vec![]),
            ],
        );
        let mut image = RgbImage::new(10, 10);
        assert_eq!(draw_tree(&mut image, &tree), 1);
    }

    #[test]
    fn test_render_round_trips_png() {
        let mut png = Vec::new();
        RgbImage::new(16, 16)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let tree = node(0, "ButtonControl", Rect::new(1, 1, 8, 8), vec![]);
        let overlay = render(&png, &tree).unwrap();
        let decoded = image::load_from_memory(&overlay).unwrap().to_rgb8();
        assert_eq!(*decoded.get_pixel(1, 1), depth_color(0));
    }

    #[test]
    fn test_render_rejects_garbage() {
        let tree = node(0, "ButtonControl", Rect::new(1, 1, 8, 8), vec![]);
        assert!(render(b"not a png", &tree).is_err());
    }
}
