// In-memory document tree
//
// A small element tree implementing `Document`. It records added-node
// batches the way a mutation observer would, so headless hosts and tests can
// forward them to the page watcher.

use std::collections::BTreeMap;

use super::dom::{is_image_tag, Document, ReadyState};
use crate::rules::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        classes: Vec<String>,
        rect: Rect,
        complete: bool,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<NodeData>,
    root: NodeId,
    body: NodeId,
    ready_state: ReadyState,
    root_style: BTreeMap<String, String>,
    mutations: Vec<Vec<NodeId>>,
}

impl DomTree {
    /// Empty `html > body` document that has finished parsing
    pub fn new() -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
            ready_state: ReadyState::Complete,
            root_style: BTreeMap::new(),
            mutations: Vec::new(),
        };
        tree.root = tree.create_element("html");
        tree.body = tree.create_element("body");
        tree.link(tree.root, tree.body);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn set_ready_state(&mut self, state: ReadyState) {
        self.ready_state = state;
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_lowercase(),
            classes: Vec::new(),
            rect: Rect::default(),
            complete: true,
        })
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    /// Append `child` under `parent`. Records a mutation batch when the
    /// parent is attached to the document.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.link(parent, child);
        if self.is_attached(parent) {
            self.mutations.push(vec![child]);
        }
    }

    /// Build a detached `img` with a rendered size and class list
    pub fn create_image(&mut self, width: f64, height: f64, classes: &[&str]) -> NodeId {
        let img = self.create_element("img");
        self.set_rect(img, Rect::new(width, height));
        self.set_classes(img, classes);
        img
    }

    /// Create an `img` and attach it to the body
    pub fn add_image(&mut self, width: f64, height: f64, classes: &[&str]) -> NodeId {
        let img = self.create_image(width, height, classes);
        let body = self.body;
        self.append_child(body, img);
        img
    }

    pub fn set_rect(&mut self, node: NodeId, new_rect: Rect) {
        if let NodeKind::Element { rect, .. } = &mut self.nodes[node.0].kind {
            *rect = new_rect;
        }
    }

    pub fn set_classes(&mut self, node: NodeId, names: &[&str]) {
        if let NodeKind::Element { classes, .. } = &mut self.nodes[node.0].kind {
            *classes = names.iter().map(|s| s.to_string()).collect();
        }
    }

    /// Mark an image as still loading (or finished)
    pub fn set_complete(&mut self, node: NodeId, done: bool) {
        if let NodeKind::Element { complete, .. } = &mut self.nodes[node.0].kind {
            *complete = done;
        }
    }

    /// Pending added-node batches since the last call
    pub fn take_mutations(&mut self) -> Vec<Vec<NodeId>> {
        std::mem::take(&mut self.mutations)
    }

    pub fn root_style_property(&self, name: &str) -> Option<&str> {
        self.root_style.get(name).map(|s| s.as_str())
    }

    /// Concatenated text of a node and its descendants
    pub fn text_content(&self, node: NodeId) -> String {
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => text.clone(),
            NodeKind::Element { .. } => self.nodes[node.0]
                .children
                .iter()
                .map(|child| self.text_content(*child))
                .collect(),
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    fn is_attached(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.root {
                return true;
            }
            current = self.nodes[id.0].parent;
        }
        false
    }

    /// Pre-order walk below `node` (excluding it) collecting matches
    fn collect_below<F>(&self, node: NodeId, matches: &F, out: &mut Vec<NodeId>)
    where
        F: Fn(&NodeData) -> bool,
    {
        for child in &self.nodes[node.0].children {
            if matches(&self.nodes[child.0]) {
                out.push(*child);
            }
            self.collect_below(*child, matches, out);
        }
    }

    fn find_below<F>(&self, node: NodeId, matches: F) -> Vec<NodeId>
    where
        F: Fn(&NodeData) -> bool,
    {
        let mut out = Vec::new();
        self.collect_below(node, &matches, &mut out);
        out
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

fn is_image_node(data: &NodeData) -> bool {
    matches!(&data.kind, NodeKind::Element { tag, .. } if is_image_tag(tag))
}

impl Document for DomTree {
    type Node = NodeId;

    fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    fn images(&self) -> Vec<NodeId> {
        self.find_below(self.root, is_image_node)
    }

    fn descendant_images(&self, node: NodeId) -> Vec<NodeId> {
        self.find_below(node, is_image_node)
    }

    fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
        self.find_below(self.root, |data| {
            matches!(&data.kind, NodeKind::Element { classes, .. } if classes.iter().any(|c| c == class))
        })
    }

    fn bounding_rect(&self, node: NodeId) -> Rect {
        match &self.nodes[node.0].kind {
            NodeKind::Element { rect, .. } if self.is_attached(node) => *rect,
            _ => Rect::default(),
        }
    }

    fn class_list(&self, node: NodeId) -> Vec<String> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { classes, .. } => classes.clone(),
            NodeKind::Text(_) => Vec::new(),
        }
    }

    fn add_class(&mut self, node: NodeId, class: &str) {
        if let NodeKind::Element { classes, .. } = &mut self.nodes[node.0].kind {
            if !classes.iter().any(|c| c == class) {
                classes.push(class.to_string());
            }
        }
    }

    fn remove_class(&mut self, node: NodeId, class: &str) {
        if let NodeKind::Element { classes, .. } = &mut self.nodes[node.0].kind {
            classes.retain(|c| c != class);
        }
    }

    fn is_complete(&self, node: NodeId) -> bool {
        match &self.nodes[node.0].kind {
            NodeKind::Element { complete, .. } => *complete,
            NodeKind::Text(_) => true,
        }
    }

    fn set_root_style_property(&mut self, name: &str, value: &str) {
        self.root_style.insert(name.to_string(), value.to_string());
    }

    fn append_notice(&mut self, class: &str, text: &str) -> NodeId {
        let div = self.create_element("div");
        self.add_class(div, class);
        let text = self.create_text(text);
        self.link(div, text);
        let body = self.body;
        self.append_child(body, div);
        div
    }

    fn remove_node(&mut self, node: NodeId) {
        self.detach(node);
    }

    fn contains(&self, node: NodeId) -> bool {
        self.is_attached(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_images_in_tree_order() {
        let mut tree = DomTree::new();
        let first = tree.add_image(10.0, 10.0, &[]);
        let section = tree.create_element("section");
        let nested = tree.create_image(20.0, 20.0, &[]);
        tree.append_child(section, nested);
        let body = tree.body();
        tree.append_child(body, section);
        let svg_image = tree.create_element("IMAGE");
        tree.append_child(section, svg_image);

        assert_eq!(tree.images(), vec![first, nested, svg_image]);
        assert_eq!(tree.descendant_images(section), vec![nested, svg_image]);
    }

    #[test]
    fn test_mutations_only_recorded_for_attached_parents() {
        let mut tree = DomTree::new();
        let wrapper = tree.create_element("div");
        let img = tree.create_image(10.0, 10.0, &[]);
        tree.append_child(wrapper, img);
        assert!(tree.take_mutations().is_empty());

        let body = tree.body();
        tree.append_child(body, wrapper);
        assert_eq!(tree.take_mutations(), vec![vec![wrapper]]);
        assert!(tree.take_mutations().is_empty());
    }

    #[test]
    fn test_detached_nodes_have_no_layout() {
        let mut tree = DomTree::new();
        let img = tree.add_image(50.0, 60.0, &[]);
        assert_eq!(tree.bounding_rect(img), Rect::new(50.0, 60.0));

        tree.remove_node(img);
        assert!(!tree.contains(img));
        assert_eq!(tree.bounding_rect(img), Rect::default());
        assert!(tree.images().is_empty());
    }

    #[test]
    fn test_notice_and_classes() {
        let mut tree = DomTree::new();
        let notice = tree.append_notice("toast", "Hello");
        assert_eq!(tree.text_content(notice), "Hello");
        assert_eq!(tree.elements_with_class("toast"), vec![notice]);

        tree.add_class(notice, "shown");
        tree.add_class(notice, "shown");
        assert_eq!(tree.class_list(notice), vec!["toast", "shown"]);
        tree.remove_class(notice, "shown");
        assert!(!tree.has_class(notice, "shown"));
    }
}
