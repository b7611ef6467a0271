//! Accessibility tree extraction.
//!
//! The walk is a best-effort snapshot of a live tree that may change under
//! it. A node whose properties cannot be read is kept as an explicit
//! `unreadable` entry so callers can tell a partial snapshot from a complete
//! one, and the walk carries on with its children and siblings.

use crate::platforms::{AccessibleNode, WindowOps};
use crate::types::{Point, Rect, WindowId};
use crate::HarvestError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Control types an exploration step may click.
pub const INTERACTIVE_CONTROL_TYPES: &[&str] = &[
    "ButtonControl",
    "CheckBoxControl",
    "ComboBoxControl",
    "ScrollBarControl",
    "RadioButtonControl",
    "HyperlinkControl",
    "ListItemControl",
    "MenuItemControl",
    "TreeItemControl",
];

/// Reason recorded for a node that repeats one of its ancestors.
pub const CYCLE_REASON: &str = "cycle";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementProperties {
    pub name: String,
    pub control_type: String,
    pub automation_id: String,
    pub is_enabled: bool,
    pub is_offscreen: bool,
    pub is_focusable: bool,
    pub rect: Rect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clickable: Option<Point>,
}

impl ElementProperties {
    fn read(node: &dyn AccessibleNode) -> Result<Self, HarvestError> {
        Ok(Self {
            name: node.name()?,
            control_type: node.control_type()?,
            automation_id: node.automation_id()?,
            is_enabled: node.is_enabled()?,
            is_offscreen: node.is_offscreen()?,
            is_focusable: node.is_focusable()?,
            rect: node.bounding_rect()?,
            // A missing clickable point is common and not a read failure.
            clickable: node.clickable_point().unwrap_or(None),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeElement {
    Readable(ElementProperties),
    Unreadable { reason: String },
}

impl NodeElement {
    pub fn properties(&self) -> Option<&ElementProperties> {
        match self {
            NodeElement::Readable(props) => Some(props),
            NodeElement::Unreadable { .. } => None,
        }
    }
}

/// One element of an extracted tree. Children keep the OS-reported order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UINode {
    pub depth: usize,
    #[serde(flatten)]
    pub element: NodeElement,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<UINode>,
}

impl UINode {
    pub fn is_readable(&self) -> bool {
        matches!(self.element, NodeElement::Readable(_))
    }

    /// Pre-order traversal.
    pub fn walk(&self) -> impl Iterator<Item = &UINode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Nodes recorded in the tree, readable or not.
    pub nodes: usize,
    pub unreadable: usize,
    pub max_depth: usize,
    pub cycles_skipped: usize,
    /// Child lists that could not be read; such nodes end up childless.
    pub child_list_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub root: UINode,
    pub stats: ExtractionStats,
}

impl Extraction {
    pub fn is_partial(&self) -> bool {
        self.stats.unreadable > 0 || self.stats.child_list_failures > 0
    }
}

struct ExtractionContext {
    stats: ExtractionStats,
    // Runtime ids of the nodes on the current root → node path.
    ancestors: HashSet<String>,
}

impl ExtractionContext {
    fn visit(&mut self, node: &dyn AccessibleNode, depth: usize) -> UINode {
        self.stats.nodes += 1;
        self.stats.max_depth = self.stats.max_depth.max(depth);

        let runtime_id = node.runtime_id();
        if let Some(id) = runtime_id.as_deref() {
            if self.ancestors.contains(id) {
                debug!("runtime id {} repeats an ancestor at depth {}", id, depth);
                self.stats.cycles_skipped += 1;
                self.stats.unreadable += 1;
                return UINode {
                    depth,
                    element: NodeElement::Unreadable {
                        reason: CYCLE_REASON.to_string(),
                    },
                    children: Vec::new(),
                };
            }
        }

        let element = match ElementProperties::read(node) {
            Ok(props) => NodeElement::Readable(props),
            Err(e) => {
                debug!("unreadable node at depth {}: {}", depth, e);
                self.stats.unreadable += 1;
                NodeElement::Unreadable {
                    reason: e.to_string(),
                }
            }
        };

        let children = match node.children() {
            Ok(children) => {
                if let Some(id) = runtime_id.clone() {
                    self.ancestors.insert(id);
                }
                let built = children
                    .iter()
                    .map(|child| self.visit(child.as_ref(), depth + 1))
                    .collect();
                if let Some(id) = runtime_id.as_deref() {
                    self.ancestors.remove(id);
                }
                built
            }
            Err(e) => {
                debug!("could not list children at depth {}: {}", depth, e);
                self.stats.child_list_failures += 1;
                Vec::new()
            }
        };

        UINode {
            depth,
            element,
            children,
        }
    }
}

/// Full depth-first extraction below `root`. Never fails: problems are
/// recorded in the tree and its stats.
pub fn extract(root: &dyn AccessibleNode) -> Extraction {
    let mut context = ExtractionContext {
        stats: ExtractionStats::default(),
        ancestors: HashSet::new(),
    };
    let root = context.visit(root, 0);
    Extraction {
        root,
        stats: context.stats,
    }
}

/// Extraction for a resolved top-level window. Only a window whose
/// accessibility root cannot be obtained at all fails.
#[instrument(skip(windows))]
pub fn extract_window(windows: &dyn WindowOps, handle: WindowId) -> Result<Extraction, HarvestError> {
    let root = windows.accessible_root(handle).map_err(|e| {
        HarvestError::ExtractionFailed(format!("No accessibility root for window {handle}: {e}"))
    })?;
    let extraction = extract(root.as_ref());
    info!(
        "Extracted {} nodes (max depth {}, {} unreadable) from window {}",
        extraction.stats.nodes, extraction.stats.max_depth, extraction.stats.unreadable, handle
    );
    Ok(extraction)
}

/// A node worth clicking during exploration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementCandidate {
    pub depth: usize,
    pub name: String,
    pub control_type: String,
    pub automation_id: String,
    pub rect: Rect,
}

impl ElementCandidate {
    pub fn center(&self) -> Point {
        self.rect.center()
    }
}

fn is_interactive(props: &ElementProperties) -> bool {
    INTERACTIVE_CONTROL_TYPES.contains(&props.control_type.as_str())
        && !props.is_offscreen
        && props.rect.has_area()
}

/// Interactive, on-screen elements with a non-empty rectangle, in pre-order.
pub fn clickable_elements(root: &UINode) -> Vec<ElementCandidate> {
    root.walk()
        .filter_map(|node| {
            let props = node.element.properties()?;
            is_interactive(props).then(|| ElementCandidate {
                depth: node.depth,
                name: props.name.clone(),
                control_type: props.control_type.clone(),
                automation_id: props.automation_id.clone(),
                rect: props.rect,
            })
        })
        .collect()
}

/// Summary row for a one-level control listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSummary {
    pub name: String,
    pub control_type: String,
    pub rect: Rect,
}

/// Direct children of `root` with their name, type and rectangle. Children
/// whose properties cannot be read are left out.
pub fn list_controls(root: &dyn AccessibleNode) -> Result<Vec<ControlSummary>, HarvestError> {
    Ok(root
        .children()?
        .iter()
        .filter_map(|child| {
            let summary = (|| {
                Ok::<_, HarvestError>(ControlSummary {
                    name: child.name()?,
                    control_type: child.control_type()?,
                    rect: child.bounding_rect()?,
                })
            })();
            match summary {
                Ok(summary) => Some(summary),
                Err(e) => {
                    debug!("skipping unreadable control: {}", e);
                    None
                }
            }
        })
        .collect())
}
