//! The fiber tree: the engine's mutable work and bookkeeping structure.
//!
//! One fiber exists per tree position of a render pass. Fibers live in an
//! arena and refer to each other through optional indices, which keeps the
//! parent/child/sibling/alternate web free of ownership cycles while
//! structural edits stay O(1).

use crate::element::{ElementKind, Props};
use crate::hooks::Hook;
use crate::host::NodeHandle;

/// Index of a fiber in its arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FiberId(pub(crate) usize);

/// Diff result for one fiber, produced by reconciliation and consumed by
/// the committer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectTag {
    Placement,
    Update,
    Deletion,
}

/// What a fiber is. `Root` marks the container fiber the engine itself
/// creates around each pass; it owns the caller-provided container node
/// and never matches any element during reconciliation.
#[derive(Clone, Debug, PartialEq)]
pub enum FiberKind {
    Root,
    Host(String),
    Component(crate::element::ComponentFn),
    Text,
}

impl FiberKind {
    pub(crate) fn of_element(kind: &ElementKind) -> Self {
        match kind {
            ElementKind::Host(tag) => FiberKind::Host(tag.clone()),
            ElementKind::Component(func) => FiberKind::Component(*func),
            ElementKind::Text => FiberKind::Text,
        }
    }

    pub(crate) fn same_type(&self, element: &ElementKind) -> bool {
        match (self, element) {
            (FiberKind::Host(tag), ElementKind::Host(other)) => tag == other,
            (FiberKind::Component(func), ElementKind::Component(other)) => {
                *func as usize == *other as usize
            }
            (FiberKind::Text, ElementKind::Text) => true,
            _ => false,
        }
    }
}

/// One tree position of one render pass.
///
/// `node` is owning: a host/text fiber that created its host node is the
/// only fiber responsible for it until a reused successor carries it
/// forward. `alternate` is a non-owning back-reference into the previous
/// committed tree, read for prior props, the carried node, and the hook
/// records; it is cleared when the pass it points into is swept.
pub struct Fiber {
    pub kind: FiberKind,
    pub props: Props,
    pub node: Option<NodeHandle>,
    pub parent: Option<FiberId>,
    pub child: Option<FiberId>,
    pub sibling: Option<FiberId>,
    pub alternate: Option<FiberId>,
    pub effect_tag: Option<EffectTag>,
    pub hooks: Vec<Hook>,
}

impl Fiber {
    pub fn new(kind: FiberKind, props: Props) -> Self {
        Self {
            kind,
            props,
            node: None,
            parent: None,
            child: None,
            sibling: None,
            alternate: None,
            effect_tag: None,
            hooks: Vec::new(),
        }
    }
}

/// Slab arena of fibers with a free list.
///
/// Superseded trees (the previous committed tree after a commit, and any
/// abandoned work-in-progress tree) are reclaimed by [`FiberArena::sweep`],
/// which keeps only what is reachable from the new current root.
#[derive(Default)]
pub struct FiberArena {
    slots: Vec<Option<Fiber>>,
    free: Vec<usize>,
}

impl FiberArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, fiber: Fiber) -> FiberId {
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(fiber);
                FiberId(index)
            }
            None => {
                self.slots.push(Some(fiber));
                FiberId(self.slots.len() - 1)
            }
        }
    }

    /// Number of live fibers.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frees every fiber not reachable from `root` via child/sibling links
    /// and clears the survivors' alternates, which by then can only point
    /// at freed positions. Runs after each commit, once hook state has
    /// migrated into the new tree.
    pub fn sweep(&mut self, root: FiberId) {
        let mut live = vec![false; self.slots.len()];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if live[id.0] {
                continue;
            }
            live[id.0] = true;
            let fiber = &self[id];
            if let Some(child) = fiber.child {
                stack.push(child);
            }
            if let Some(sibling) = fiber.sibling {
                stack.push(sibling);
            }
        }
        for (index, slot) in self.slots.iter_mut().enumerate() {
            match slot {
                Some(fiber) if live[index] => {
                    fiber.alternate = None;
                }
                Some(_) => {
                    *slot = None;
                    self.free.push(index);
                }
                None => {}
            }
        }
    }
}

impl std::ops::Index<FiberId> for FiberArena {
    type Output = Fiber;

    fn index(&self, id: FiberId) -> &Fiber {
        match self.slots.get(id.0).and_then(Option::as_ref) {
            Some(fiber) => fiber,
            None => panic!("fiber {:?} has been freed", id),
        }
    }
}

impl std::ops::IndexMut<FiberId> for FiberArena {
    fn index_mut(&mut self, id: FiberId) -> &mut Fiber {
        match self.slots.get_mut(id.0).and_then(Option::as_mut) {
            Some(fiber) => fiber,
            None => panic!("fiber {:?} has been freed", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fiber(kind: FiberKind) -> Fiber {
        Fiber::new(kind, Props::new())
    }

    #[test]
    fn sweep_frees_unreachable_fibers_and_clears_alternates() {
        let mut arena = FiberArena::new();
        let old_root = arena.alloc(fiber(FiberKind::Root));
        let old_child = arena.alloc(fiber(FiberKind::Host("div".into())));
        arena[old_root].child = Some(old_child);
        arena[old_child].parent = Some(old_root);

        let new_root = arena.alloc(fiber(FiberKind::Root));
        let new_child = arena.alloc(fiber(FiberKind::Host("div".into())));
        arena[new_root].child = Some(new_child);
        arena[new_root].alternate = Some(old_root);
        arena[new_child].parent = Some(new_root);
        arena[new_child].alternate = Some(old_child);

        assert_eq!(arena.len(), 4);
        arena.sweep(new_root);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena[new_root].alternate, None);
        assert_eq!(arena[new_child].alternate, None);

        // Freed slots are reused before the slab grows.
        let reused = arena.alloc(fiber(FiberKind::Text));
        assert!(reused.0 < 4);
    }

    #[test]
    #[should_panic(expected = "has been freed")]
    fn indexing_a_freed_fiber_panics() {
        let mut arena = FiberArena::new();
        let root = arena.alloc(fiber(FiberKind::Root));
        let stale = arena.alloc(fiber(FiberKind::Text));
        arena.sweep(root);
        let _ = &arena[stale];
    }
}
