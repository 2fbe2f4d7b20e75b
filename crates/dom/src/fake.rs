//! An in-memory [`LiveTree`] used by this crate's own tests, standing in for
//! a real browser document.

#[cfg(any(test, feature = "fake-tree"))]
pub use imp::{FakeHandle, FakeNode, FakeTree};

#[cfg(any(test, feature = "fake-tree"))]
mod imp {
    use std::collections::HashMap;

    use crate::layout_state::LayoutGeometry;
    use crate::live_tree::{LiveNodeKind, LiveTree};

    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct FakeHandle(pub u64);

    #[derive(Clone, Debug)]
    pub struct FakeNode {
        pub parent: Option<FakeHandle>,
        pub children: Vec<FakeHandle>,
        pub kind: LiveNodeKind,
        pub attributes: Vec<(String, String)>,
        pub ignored: bool,
        pub geometry: Option<LayoutGeometry>,
    }

    /// A plain arena of [`FakeNode`]s addressed by [`FakeHandle`], with the
    /// same parent/child/attribute surface a real DOM exposes.
    #[derive(Default)]
    pub struct FakeTree {
        nodes: HashMap<u64, FakeNode>,
        next: u64,
    }

    impl FakeTree {
        #[must_use]
        pub fn new() -> Self {
            let mut tree = Self { nodes: HashMap::new(), next: 1 };
            tree.nodes.insert(
                0,
                FakeNode {
                    parent: None,
                    children: Vec::new(),
                    kind: LiveNodeKind::Document,
                    attributes: Vec::new(),
                    ignored: false,
                    geometry: None,
                },
            );
            tree
        }

        pub fn append_element(&mut self, parent: FakeHandle, tag: &str) -> FakeHandle {
            self.append(parent, LiveNodeKind::Element { tag: tag.to_string() }, false)
        }

        pub fn append_text(&mut self, parent: FakeHandle, text: &str) -> FakeHandle {
            self.append(parent, LiveNodeKind::Text { text: text.to_string() }, false)
        }

        fn append(&mut self, parent: FakeHandle, kind: LiveNodeKind, ignored: bool) -> FakeHandle {
            let handle = FakeHandle(self.next);
            self.next += 1;
            self.nodes.insert(
                handle.0,
                FakeNode {
                    parent: Some(parent),
                    children: Vec::new(),
                    kind,
                    attributes: Vec::new(),
                    ignored,
                    geometry: None,
                },
            );
            self.nodes.get_mut(&parent.0).expect("parent exists").children.push(handle);
            handle
        }

        pub fn set_geometry(&mut self, handle: FakeHandle, geometry: LayoutGeometry) {
            self.nodes.get_mut(&handle.0).expect("node exists").geometry = Some(geometry);
        }

        pub fn set_attribute(&mut self, handle: FakeHandle, key: &str, value: &str) {
            let node = self.nodes.get_mut(&handle.0).expect("node exists");
            if let Some(existing) = node.attributes.iter_mut().find(|(k, _)| k == key) {
                existing.1 = value.to_string();
            } else {
                node.attributes.push((key.to_string(), value.to_string()));
            }
        }

        pub fn detach(&mut self, handle: FakeHandle) {
            if let Some(parent) = self.nodes.get(&handle.0).and_then(|n| n.parent) {
                if let Some(parent_node) = self.nodes.get_mut(&parent.0) {
                    parent_node.children.retain(|child| *child != handle);
                }
            }
            if let Some(node) = self.nodes.get_mut(&handle.0) {
                node.parent = None;
            }
        }

        pub fn reparent(&mut self, handle: FakeHandle, new_parent: FakeHandle, before: Option<FakeHandle>) {
            self.detach(handle);
            let siblings = &mut self.nodes.get_mut(&new_parent.0).expect("parent exists").children;
            let position = before
                .and_then(|b| siblings.iter().position(|s| *s == b))
                .unwrap_or(siblings.len());
            siblings.insert(position, handle);
            self.nodes.get_mut(&handle.0).expect("node exists").parent = Some(new_parent);
        }
    }

    impl LiveTree for FakeTree {
        type Handle = FakeHandle;

        fn root(&self) -> Self::Handle {
            FakeHandle(0)
        }

        fn parent(&self, node: Self::Handle) -> Option<Self::Handle> {
            self.nodes.get(&node.0).and_then(|n| n.parent)
        }

        fn children(&self, node: Self::Handle) -> Vec<Self::Handle> {
            self.nodes.get(&node.0).map(|n| n.children.clone()).unwrap_or_default()
        }

        fn kind(&self, node: Self::Handle) -> LiveNodeKind {
            self.nodes.get(&node.0).map(|n| n.kind.clone()).unwrap_or(LiveNodeKind::Document)
        }

        fn attributes(&self, node: Self::Handle) -> Vec<(String, String)> {
            self.nodes.get(&node.0).map(|n| n.attributes.clone()).unwrap_or_default()
        }

        fn is_ignored(&self, node: Self::Handle) -> bool {
            self.nodes.get(&node.0).is_some_and(|n| n.ignored)
        }

        fn geometry(&self, node: Self::Handle) -> Option<LayoutGeometry> {
            self.nodes.get(&node.0).and_then(|n| n.geometry)
        }
    }
}
