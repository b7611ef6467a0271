use crate::platforms::AccessibleNode;
use crate::types::{Point, Rect};
use crate::HarvestError;
use std::rc::Rc;
use uiautomation::{UIElement, UITreeWalker};

/// Live UI Automation element, walked through the control view.
pub struct UiaNode {
    element: UIElement,
    walker: Rc<UITreeWalker>,
}

impl UiaNode {
    pub(crate) fn new(element: UIElement, walker: Rc<UITreeWalker>) -> Self {
        Self { element, walker }
    }
}

impl AccessibleNode for UiaNode {
    fn name(&self) -> Result<String, HarvestError> {
        Ok(self.element.get_name()?)
    }

    // Same spelling the layout files have always used: "ButtonControl", ...
    fn control_type(&self) -> Result<String, HarvestError> {
        let control_type = self.element.get_control_type()?;
        Ok(format!("{control_type:?}Control"))
    }

    fn automation_id(&self) -> Result<String, HarvestError> {
        Ok(self.element.get_automation_id()?)
    }

    fn is_enabled(&self) -> Result<bool, HarvestError> {
        Ok(self.element.is_enabled()?)
    }

    fn is_offscreen(&self) -> Result<bool, HarvestError> {
        Ok(self.element.is_offscreen()?)
    }

    fn is_focusable(&self) -> Result<bool, HarvestError> {
        Ok(self.element.is_keyboard_focusable()?)
    }

    fn bounding_rect(&self) -> Result<Rect, HarvestError> {
        let rect = self.element.get_bounding_rectangle()?;
        Ok(Rect::new(
            rect.get_left(),
            rect.get_top(),
            rect.get_right(),
            rect.get_bottom(),
        ))
    }

    fn clickable_point(&self) -> Result<Option<Point>, HarvestError> {
        Ok(self
            .element
            .get_clickable_point()?
            .map(|p| Point::new(p.get_x(), p.get_y())))
    }

    fn runtime_id(&self) -> Option<String> {
        self.element.get_runtime_id().ok().map(|parts| {
            parts
                .iter()
                .map(i32::to_string)
                .collect::<Vec<_>>()
                .join(".")
        })
    }

    fn children(&self) -> Result<Vec<Box<dyn AccessibleNode>>, HarvestError> {
        let mut children: Vec<Box<dyn AccessibleNode>> = Vec::new();
        // The walker reports "no first child" as an error.
        let mut next = self.walker.get_first_child(&self.element).ok();
        while let Some(element) = next {
            next = self.walker.get_next_sibling(&element).ok();
            children.push(Box::new(UiaNode::new(element, Rc::clone(&self.walker))));
        }
        Ok(children)
    }
}
