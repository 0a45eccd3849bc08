// Document abstraction
//
// The subset of DOM capabilities the page watcher relies on. Browser hosts
// implement it over real element bindings; `DomTree` implements it in memory.

use std::fmt::Debug;
use std::hash::Hash;

use crate::rules::Rect;

/// Tag names treated as images (HTML `img` and SVG `image`)
pub const IMAGE_TAGS: [&str; 2] = ["img", "image"];

pub fn is_image_tag(tag: &str) -> bool {
    IMAGE_TAGS.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

/// Document loading phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

pub trait Document {
    /// Node handle; stays valid for as long as the node exists
    type Node: Copy + Eq + Hash + Debug;

    fn ready_state(&self) -> ReadyState;

    /// Tag name of an element node, `None` for text and other node kinds
    fn tag_name(&self, node: Self::Node) -> Option<String>;

    /// All image elements currently in the document, in tree order
    fn images(&self) -> Vec<Self::Node>;

    /// Image elements below `node`, excluding `node` itself
    fn descendant_images(&self, node: Self::Node) -> Vec<Self::Node>;

    /// Elements carrying `class`, in tree order
    fn elements_with_class(&self, class: &str) -> Vec<Self::Node>;

    fn bounding_rect(&self, node: Self::Node) -> Rect;

    fn class_list(&self, node: Self::Node) -> Vec<String>;

    fn has_class(&self, node: Self::Node, class: &str) -> bool {
        self.class_list(node).iter().any(|c| c == class)
    }

    fn add_class(&mut self, node: Self::Node, class: &str);

    fn remove_class(&mut self, node: Self::Node, class: &str);

    /// Whether an image has finished loading
    fn is_complete(&self, node: Self::Node) -> bool;

    /// Set a custom property on the root element's inline style
    fn set_root_style_property(&mut self, name: &str, value: &str);

    /// Append a `div` with the given class and text to the body
    fn append_notice(&mut self, class: &str, text: &str) -> Self::Node;

    /// Detach a node from the document
    fn remove_node(&mut self, node: Self::Node);

    /// Whether the node is still attached to the document
    fn contains(&self, node: Self::Node) -> bool;
}
