//! Container cursors for the element tree a rerun produces.
//!
//! Every element lands at a delta path: the root container index followed by
//! the element's position inside each nested container. A [`ContainerStack`]
//! tracks which container is currently being written to and the next free
//! slot in every container it has seen. Cloning the stack is the snapshot
//! fragments replay against.

use std::collections::HashMap;
use std::fmt;

/// Top-level containers of an app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootContainer {
    Main,
    Sidebar,
}

impl RootContainer {
    fn index(self) -> usize {
        match self {
            RootContainer::Main => 0,
            RootContainer::Sidebar => 1,
        }
    }
}

/// Position of an element or container in the element tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeltaPath(Vec<usize>);

impl DeltaPath {
    pub fn root(root: RootContainer) -> Self {
        Self(vec![root.index()])
    }

    pub fn child(&self, index: usize) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        Self(path)
    }

    /// True when `self` is `ancestor` or lies somewhere beneath it.
    pub fn is_within(&self, ancestor: &DeltaPath) -> bool {
        self.0.starts_with(&ancestor.0)
    }

    pub fn segments(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for DeltaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|idx| idx.to_string()).collect();
        write!(f, "[{}]", parts.join(","))
    }
}

/// What kind of element a write produces. Interactive elements carry user
/// input back into the session and are subject to fragment placement rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Interactive,
    Display,
}

/// Handle to a container created during a rerun.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    path: DeltaPath,
}

impl ContainerHandle {
    pub fn path(&self) -> &DeltaPath {
        &self.path
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStack {
    frames: Vec<DeltaPath>,
    next_index: HashMap<DeltaPath, usize>,
}

impl Default for ContainerStack {
    fn default() -> Self {
        Self::new(RootContainer::Main)
    }
}

impl ContainerStack {
    pub fn new(root: RootContainer) -> Self {
        Self {
            frames: vec![DeltaPath::root(root)],
            next_index: HashMap::new(),
        }
    }

    /// Path of the container elements are currently written to.
    pub fn active(&self) -> &DeltaPath {
        // The root frame is never popped.
        &self.frames[self.frames.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Reserve the next slot in the active container.
    pub fn allocate(&mut self) -> DeltaPath {
        let parent = self.active().clone();
        let slot = self.next_index.entry(parent.clone()).or_insert(0);
        let path = parent.child(*slot);
        *slot += 1;
        path
    }

    /// Allocate a container in the active container without entering it.
    pub fn new_container(&mut self) -> ContainerHandle {
        ContainerHandle {
            path: self.allocate(),
        }
    }

    pub fn push(&mut self, container: &ContainerHandle) {
        self.frames.push(container.path.clone());
    }

    /// Leave the innermost container. The root frame stays in place.
    pub fn pop(&mut self) -> Option<DeltaPath> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    /// Switch writing to another root container, e.g. the sidebar.
    pub fn enter_root(&mut self, root: RootContainer) {
        self.frames.push(DeltaPath::root(root));
    }

    /// Start a fresh rerun: back to the main root with empty containers.
    pub fn reset(&mut self) {
        *self = Self::new(RootContainer::Main);
    }
}
