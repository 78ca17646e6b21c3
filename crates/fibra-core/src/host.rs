//! The host-tree port.
//!
//! The engine never touches a real display tree directly; it speaks to an
//! implementation of [`HostTree`], an opaque capability for creating nodes
//! and mutating attributes, listeners, and parent/child links.
//! [`MemoryHost`] is the reference implementation: a slab of inspectable
//! nodes, used by the tests and the demos.

use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;
use indexmap::IndexMap;

/// Opaque handle to one host node.
pub type NodeHandle = usize;

/// Failure of a host mutation. The engine recovers nothing: a `HostError`
/// aborts the commit (or the render-phase node creation) it occurred in and
/// propagates to whoever drives the work loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    Missing { node: NodeHandle },
    NotAChild { parent: NodeHandle, child: NodeHandle },
    NotAnElement { node: NodeHandle },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Missing { node } => write!(f, "host node {node} missing"),
            HostError::NotAChild { parent, child } => {
                write!(f, "host node {child} is not a child of {parent}")
            }
            HostError::NotAnElement { node } => {
                write!(f, "host node {node} is a text node")
            }
        }
    }
}

impl std::error::Error for HostError {}

/// Payload delivered to event handlers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub value: Option<String>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// Shared, identity-compared event callback.
///
/// Listener props compare by pointer, which is what lets the committer
/// detect a swapped handler and re-register it.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new(callback: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(callback))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &EventHandler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0))
    }
}

/// Mutation capability over the host's visual tree.
pub trait HostTree {
    fn create_node(&mut self, tag: &str) -> Result<NodeHandle, HostError>;
    fn create_text_node(&mut self) -> Result<NodeHandle, HostError>;
    fn set_attribute(&mut self, node: NodeHandle, name: &str, value: &str)
        -> Result<(), HostError>;
    fn remove_attribute(&mut self, node: NodeHandle, name: &str) -> Result<(), HostError>;
    fn add_event_listener(
        &mut self,
        node: NodeHandle,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), HostError>;
    fn remove_event_listener(
        &mut self,
        node: NodeHandle,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError>;
    fn append_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<(), HostError>;
    fn remove_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<(), HostError>;
}

/// One node in the in-memory host.
#[derive(Debug, Default)]
pub struct MemoryNode {
    tag: Option<String>,
    attributes: IndexMap<String, String>,
    listeners: HashMap<String, Vec<EventHandler>>,
    children: Vec<NodeHandle>,
}

impl MemoryNode {
    fn element(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_owned()),
            ..Self::default()
        }
    }

    fn text() -> Self {
        Self::default()
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn is_text(&self) -> bool {
        self.tag.is_none()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }
}

/// In-memory [`HostTree`]: a slab of nodes with recorded attributes,
/// listeners, and child links. Supports dispatching events into recorded
/// listeners and dumping the tree for debugging.
#[derive(Default)]
pub struct MemoryHost {
    nodes: Vec<Option<MemoryNode>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a detached container node to render into.
    pub fn create_root(&mut self) -> NodeHandle {
        self.alloc(MemoryNode::element("#root"))
    }

    fn alloc(&mut self, node: MemoryNode) -> NodeHandle {
        let handle = self.nodes.len();
        self.nodes.push(Some(node));
        handle
    }

    pub fn node(&self, handle: NodeHandle) -> Result<&MemoryNode, HostError> {
        self.nodes
            .get(handle)
            .and_then(Option::as_ref)
            .ok_or(HostError::Missing { node: handle })
    }

    fn node_mut(&mut self, handle: NodeHandle) -> Result<&mut MemoryNode, HostError> {
        self.nodes
            .get_mut(handle)
            .and_then(Option::as_mut)
            .ok_or(HostError::Missing { node: handle })
    }

    /// Number of live nodes in the slab, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fires every listener registered on `node` for `event.name`.
    /// Handlers are cloned out first so they may re-enter the host (a
    /// click handler typically schedules a re-render).
    pub fn dispatch(&self, node: NodeHandle, event: &Event) -> Result<usize, HostError> {
        let handlers: Vec<EventHandler> = self
            .node(node)?
            .listeners
            .get(&event.name)
            .map(|handlers| handlers.to_vec())
            .unwrap_or_default();
        for handler in &handlers {
            handler.call(event);
        }
        Ok(handlers.len())
    }

    pub fn dump_tree(&self, root: NodeHandle) -> String {
        let mut out = String::new();
        self.dump_node(&mut out, root, 0);
        out
    }

    fn dump_node(&self, out: &mut String, handle: NodeHandle, depth: usize) {
        let indent = "  ".repeat(depth);
        match self.node(handle) {
            Ok(node) => {
                match node.tag() {
                    Some(tag) => {
                        out.push_str(&format!("{indent}[{handle}] <{tag}>"));
                        for (name, value) in node.attributes() {
                            out.push_str(&format!(" {name}={value:?}"));
                        }
                    }
                    None => {
                        let text = node.attribute(crate::element::NODE_VALUE).unwrap_or("");
                        out.push_str(&format!("{indent}[{handle}] {text:?}"));
                    }
                }
                out.push('\n');
                for child in node.children() {
                    self.dump_node(out, *child, depth + 1);
                }
            }
            Err(_) => {
                out.push_str(&format!("{indent}[{handle}] (missing)\n"));
            }
        }
    }
}

impl HostTree for MemoryHost {
    fn create_node(&mut self, tag: &str) -> Result<NodeHandle, HostError> {
        Ok(self.alloc(MemoryNode::element(tag)))
    }

    fn create_text_node(&mut self) -> Result<NodeHandle, HostError> {
        Ok(self.alloc(MemoryNode::text()))
    }

    fn set_attribute(
        &mut self,
        node: NodeHandle,
        name: &str,
        value: &str,
    ) -> Result<(), HostError> {
        self.node_mut(node)?
            .attributes
            .insert(name.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeHandle, name: &str) -> Result<(), HostError> {
        self.node_mut(node)?.attributes.shift_remove(name);
        Ok(())
    }

    fn add_event_listener(
        &mut self,
        node: NodeHandle,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), HostError> {
        self.node_mut(node)?
            .listeners
            .entry(event.to_owned())
            .or_default()
            .push(handler);
        Ok(())
    }

    fn remove_event_listener(
        &mut self,
        node: NodeHandle,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError> {
        let listeners = &mut self.node_mut(node)?.listeners;
        if let Some(handlers) = listeners.get_mut(event) {
            handlers.retain(|existing| !existing.ptr_eq(handler));
            if handlers.is_empty() {
                listeners.remove(event);
            }
        }
        Ok(())
    }

    fn append_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<(), HostError> {
        self.node(child)?;
        let parent_node = self.node_mut(parent)?;
        parent_node.children.push(child);
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<(), HostError> {
        let parent_node = self.node_mut(parent)?;
        let position = parent_node
            .children
            .iter()
            .position(|existing| *existing == child)
            .ok_or(HostError::NotAChild { parent, child })?;
        parent_node.children.remove(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn append_and_remove_child_track_order() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let a = host.create_node("h1").unwrap();
        let b = host.create_node("h2").unwrap();
        host.append_child(root, a).unwrap();
        host.append_child(root, b).unwrap();
        assert_eq!(host.node(root).unwrap().children(), &[a, b]);

        host.remove_child(root, a).unwrap();
        assert_eq!(host.node(root).unwrap().children(), &[b]);
        assert_eq!(
            host.remove_child(root, a),
            Err(HostError::NotAChild {
                parent: root,
                child: a
            })
        );
    }

    #[test]
    fn missing_nodes_surface_as_errors() {
        let mut host = MemoryHost::new();
        assert_eq!(
            host.set_attribute(7, "id", "x"),
            Err(HostError::Missing { node: 7 })
        );
    }

    #[test]
    fn listeners_are_removed_by_identity() {
        let mut host = MemoryHost::new();
        let node = host.create_node("button").unwrap();
        let kept = EventHandler::new(|_| {});
        let dropped = EventHandler::new(|_| {});
        host.add_event_listener(node, "click", kept.clone()).unwrap();
        host.add_event_listener(node, "click", dropped.clone())
            .unwrap();
        host.remove_event_listener(node, "click", &dropped).unwrap();
        assert_eq!(host.node(node).unwrap().listener_count("click"), 1);
        host.remove_event_listener(node, "click", &kept).unwrap();
        assert_eq!(host.node(node).unwrap().listener_count("click"), 0);
    }

    #[test]
    fn dispatch_calls_every_matching_listener() {
        let mut host = MemoryHost::new();
        let node = host.create_node("input").unwrap();
        let seen = std::rc::Rc::new(Cell::new(0));
        let seen_in_handler = seen.clone();
        host.add_event_listener(
            node,
            "input",
            EventHandler::new(move |event| {
                assert_eq!(event.value.as_deref(), Some("World"));
                seen_in_handler.set(seen_in_handler.get() + 1);
            }),
        )
        .unwrap();

        let fired = host
            .dispatch(node, &Event::with_value("input", "World"))
            .unwrap();
        assert_eq!(fired, 1);
        assert_eq!(seen.get(), 1);
        assert_eq!(host.dispatch(node, &Event::new("click")).unwrap(), 0);
    }
}
