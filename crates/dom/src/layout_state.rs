//! The value objects emitted by the Shadow DOM Mirror and Layout Tracker.

use crate::identity::NodeIndex;
use serde::{Deserialize, Serialize};

/// What triggered a [`LayoutState`] to be produced.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum Source {
    Discover,
    Mutation,
    Scroll,
    Input,
}

/// How a node's tree position or content changed.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum Action {
    Insert,
    Update,
    Move,
    Remove,
}

/// Geometric and scroll data captured for element nodes.
#[derive(Clone, Copy, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub scroll_x: Option<f64>,
    pub scroll_y: Option<f64>,
}

/// The content half of a [`LayoutState`]: element geometry, text, or nothing
/// (ignored nodes, and the root document node).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LayoutPayload {
    Element(LayoutGeometry),
    Text(String),
    /// Content the capture policy withheld (`show_text`/`show_images` off),
    /// kept distinct from [`Self::Ignored`] so a consumer can tell "policy
    /// redacted this" from "this node is marked do-not-record".
    Redacted,
    Ignored,
    None,
}

/// A structured snapshot of one node at one instant.
///
/// Immutable once emitted; the tracker keeps only the latest snapshot per
/// index so watch-binding callbacks can deep-copy it for the next update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutState {
    pub index: NodeIndex,
    pub parent: Option<NodeIndex>,
    pub previous: Option<NodeIndex>,
    pub next: Option<NodeIndex>,
    pub source: Source,
    pub action: Action,
    pub tag: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub layout: LayoutPayload,
    pub mutation_sequence: Option<u64>,
}

impl LayoutState {
    /// Deep-copies this state with a new source/action, as watch bindings do
    /// when turning a scroll or input sample into a fresh event.
    #[must_use]
    pub fn derive(&self, source: Source, action: Action) -> Self {
        let mut next = self.clone();
        next.source = source;
        next.action = action;
        next.mutation_sequence = None;
        next
    }
}
