//! Immutable element descriptions.
//!
//! An [`Element`] is a plain value describing one node the host tree should
//! contain: a kind (host tag, component function, or text) plus properties,
//! including an ordered children sequence. Elements are produced fresh on
//! every render pass and never mutated; the engine's own bookkeeping lives
//! in the fiber tree instead.

use std::fmt;

use indexmap::IndexMap;

use crate::host::EventHandler;

/// Signature of a user component: evaluate the current props into the
/// single child element the component renders to.
pub type ComponentFn = fn(&Props) -> Element;

/// Attribute under which a text element carries its content.
pub const NODE_VALUE: &str = "nodeValue";

/// What an element (and later its fiber) is: a host tag, a component
/// function, or a text node.
#[derive(Clone)]
pub enum ElementKind {
    Host(String),
    Component(ComponentFn),
    Text,
}

impl ElementKind {
    /// Type equality as the reconciler sees it: value equality for tags,
    /// pointer identity for component functions.
    pub fn same_type(&self, other: &ElementKind) -> bool {
        match (self, other) {
            (ElementKind::Host(a), ElementKind::Host(b)) => a == b,
            (ElementKind::Component(a), ElementKind::Component(b)) => {
                *a as usize == *b as usize
            }
            (ElementKind::Text, ElementKind::Text) => true,
            _ => false,
        }
    }
}

impl PartialEq for ElementKind {
    fn eq(&self, other: &Self) -> bool {
        self.same_type(other)
    }
}

impl fmt::Debug for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Host(tag) => f.debug_tuple("Host").field(tag).finish(),
            ElementKind::Component(func) => f
                .debug_tuple("Component")
                .field(&(*func as usize as *const ()))
                .finish(),
            ElementKind::Text => f.write_str("Text"),
        }
    }
}

/// A single property value.
///
/// Handlers compare by identity, everything else by value; this is what
/// drives the committer's "new or changed" test.
#[derive(Clone, Debug)]
pub enum PropValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Style(IndexMap<String, String>),
    Handler(EventHandler),
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Text(a), PropValue::Text(b)) => a == b,
            (PropValue::Number(a), PropValue::Number(b)) => a == b,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Style(a), PropValue::Style(b)) => a == b,
            (PropValue::Handler(a), PropValue::Handler(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl PropValue {
    pub fn is_handler(&self) -> bool {
        matches!(self, PropValue::Handler(_))
    }

    /// Textual form handed to the host for non-handler values. Style maps
    /// are serialized to `name:value;` runs with camelCase names folded to
    /// kebab-case.
    pub fn host_text(&self) -> Option<String> {
        match self {
            PropValue::Text(text) => Some(text.clone()),
            PropValue::Number(n) => Some(format!("{n}")),
            PropValue::Bool(b) => Some(format!("{b}")),
            PropValue::Style(style) => Some(style_text(style)),
            PropValue::Handler(_) => None,
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Text(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Text(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Number(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Number(value as f64)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        PropValue::Handler(value)
    }
}

pub(crate) fn style_text(style: &IndexMap<String, String>) -> String {
    let mut out = String::new();
    for (name, value) in style {
        out.push_str(&css_name(name));
        out.push(':');
        out.push_str(value);
        out.push(';');
    }
    out
}

fn css_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Ordered properties of an element: named attributes plus the children
/// sequence. The children are not an attribute; the committer never diffs
/// them as one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Props {
    attrs: IndexMap<String, PropValue>,
    pub children: Vec<Element>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropValue>) {
        self.attrs.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.attrs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.attrs.get(name) {
            Some(PropValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.attrs.get(name) {
            Some(PropValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.attrs.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// One node of the declarative tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub kind: ElementKind,
    pub props: Props,
}

impl Element {
    pub fn host(tag: impl Into<String>) -> Self {
        Self {
            kind: ElementKind::Host(tag.into()),
            props: Props::new(),
        }
    }

    pub fn component(func: ComponentFn) -> Self {
        Self {
            kind: ElementKind::Component(func),
            props: Props::new(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        let mut props = Props::new();
        props.set(NODE_VALUE, content.into());
        Self {
            kind: ElementKind::Text,
            props,
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.set(name, value);
        self
    }

    /// Registers an event handler under the conventional `on`-prefixed
    /// attribute name, e.g. `on("click", ..)` becomes `onclick`.
    pub fn on(mut self, event: &str, handler: impl Fn(&crate::host::Event) + 'static) -> Self {
        self.props
            .set(format!("on{event}"), EventHandler::new(handler));
        self
    }

    pub fn style<K, V>(mut self, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let style: IndexMap<String, String> = entries
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        self.props.set("style", PropValue::Style(style));
        self
    }

    pub fn child(mut self, child: impl Into<Element>) -> Self {
        self.props.children.push(child.into());
        self
    }

    pub fn children<C>(mut self, children: C) -> Self
    where
        C: IntoIterator,
        C::Item: Into<Element>,
    {
        self.props
            .children
            .extend(children.into_iter().map(Into::into));
        self
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Element::text(value)
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Element::text(value)
    }
}

/// Builds an element the way the reference surface does: a kind, an
/// attribute list, and children, with plain strings wrapped as text
/// elements.
pub fn create_element<A, K, V, C>(kind: ElementKind, attrs: A, children: C) -> Element
where
    A: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<PropValue>,
    C: IntoIterator,
    C::Item: Into<Element>,
{
    let mut props = Props::new();
    for (name, value) in attrs {
        props.set(name, value);
    }
    props.children = children.into_iter().map(Into::into).collect();
    Element { kind, props }
}

pub fn create_text_element(text: impl Into<String>) -> Element {
    Element::text(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(_props: &Props) -> Element {
        Element::text("leaf")
    }

    fn other(_props: &Props) -> Element {
        Element::text("other")
    }

    #[test]
    fn host_types_compare_by_tag() {
        assert!(ElementKind::Host("div".into()).same_type(&ElementKind::Host("div".into())));
        assert!(!ElementKind::Host("div".into()).same_type(&ElementKind::Host("p".into())));
        assert!(!ElementKind::Host("div".into()).same_type(&ElementKind::Text));
    }

    #[test]
    fn component_types_compare_by_identity() {
        assert!(ElementKind::Component(leaf).same_type(&ElementKind::Component(leaf)));
        assert!(!ElementKind::Component(leaf).same_type(&ElementKind::Component(other)));
    }

    #[test]
    fn string_children_become_text_elements() {
        let element = create_element(
            ElementKind::Host("h1".into()),
            [("id", "title")],
            ["Hello"],
        );
        assert_eq!(element.props.children.len(), 1);
        let child = &element.props.children[0];
        assert!(matches!(child.kind, ElementKind::Text));
        assert_eq!(child.props.text(NODE_VALUE), Some("Hello"));
    }

    #[test]
    fn style_maps_serialize_to_kebab_case_css() {
        let mut style = IndexMap::new();
        style.insert("background".to_owned(), "salmon".to_owned());
        style.insert("textAlign".to_owned(), "right".to_owned());
        assert_eq!(style_text(&style), "background:salmon;text-align:right;");
    }

    #[test]
    fn handlers_compare_by_pointer() {
        let a = EventHandler::new(|_| {});
        let b = a.clone();
        let c = EventHandler::new(|_| {});
        assert_eq!(PropValue::Handler(a.clone()), PropValue::Handler(b));
        assert_ne!(PropValue::Handler(a), PropValue::Handler(c));
    }

    #[test]
    fn number_values_render_without_trailing_zeros() {
        assert_eq!(PropValue::Number(3.0).host_text().as_deref(), Some("3"));
        assert_eq!(PropValue::Number(2.5).host_text().as_deref(), Some("2.5"));
    }
}
