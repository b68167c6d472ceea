//! Element model - immutable descriptions of what should be rendered.
//!
//! Elements are the input to reconciliation. They are built once, shared by
//! `Rc`, and never mutated after construction:
//!
//! ```text
//! Element { type: Host("div") | Component(App) | Fragment, key, props }
//! props.children: Empty | Text | Element | List([...])
//! ```
//!
//! # Example
//!
//! ```ignore
//! use spark_reconciler::element::{Element, text};
//!
//! let tree = Element::host("ul")
//!     .attr("class", "todos")
//!     .children([
//!         Element::host("li").key("a").child(text("first")),
//!         Element::host("li").key("b").child(text("second")),
//!     ]);
//! ```

use std::any::{type_name, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::RenderResult;
use crate::reconciler::Hooks;

/// Element key used to match children across renders.
pub type Key = Rc<str>;

// =============================================================================
// Values
// =============================================================================

/// A primitive prop value. Also used for effect dependency lists.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(Rc<str>),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(value: Rc<str>) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

// =============================================================================
// Props
// =============================================================================

/// Element props: ordered attributes plus children.
#[derive(Debug, Clone, Default)]
pub struct Props {
    attributes: BTreeMap<Rc<str>, Value>,
    children: Child,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an attribute by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Iterate attributes in name order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attributes.iter().map(|(k, v)| (&**k, v))
    }

    pub fn children(&self) -> &Child {
        &self.children
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn set_children(&mut self, children: impl Into<Child>) {
        self.children = children.into();
    }
}

/// One changed attribute. `value: None` means the attribute was removed.
#[derive(Debug, Clone, PartialEq)]
pub struct PropChange {
    pub name: Rc<str>,
    pub value: Option<Value>,
}

/// Diff two attribute sets. Children are not compared.
///
/// Removals come first (in name order), then additions and changes.
pub fn diff_props(old: &Props, new: &Props) -> Vec<PropChange> {
    let mut changes = Vec::new();

    for name in old.attributes.keys() {
        if !new.attributes.contains_key(name) {
            changes.push(PropChange {
                name: name.clone(),
                value: None,
            });
        }
    }

    for (name, value) in &new.attributes {
        if old.attributes.get(name) != Some(value) {
            changes.push(PropChange {
                name: name.clone(),
                value: Some(value.clone()),
            });
        }
    }

    changes
}

// =============================================================================
// Components
// =============================================================================

/// A function component.
///
/// Any `Fn(&mut Hooks, &Props) -> RenderResult<Child>` is a component.
/// Component identity is the Rust type of the implementor, so two elements
/// built from the same function are the "same type" for reconciliation.
pub trait Component: 'static {
    fn render(&self, hooks: &mut Hooks, props: &Props) -> RenderResult<Child>;
}

impl<F> Component for F
where
    F: Fn(&mut Hooks, &Props) -> RenderResult<Child> + 'static,
{
    fn render(&self, hooks: &mut Hooks, props: &Props) -> RenderResult<Child> {
        self(hooks, props)
    }
}

/// Type-erased component with its identity.
#[derive(Clone)]
pub struct ComponentType {
    id: TypeId,
    name: &'static str,
    component: Rc<dyn Component>,
}

impl ComponentType {
    pub fn of<C: Component>(component: C) -> Self {
        let full = type_name::<C>();
        let name = full
            .trim_end_matches("::{{closure}}")
            .rsplit("::")
            .next()
            .unwrap_or(full);
        Self {
            id: TypeId::of::<C>(),
            name,
            component: Rc::new(component),
        }
    }

    /// Short name of the component function, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn render(&self, hooks: &mut Hooks, props: &Props) -> RenderResult<Child> {
        self.component.render(hooks, props)
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentType {}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name)
    }
}

// =============================================================================
// Elements
// =============================================================================

/// What an element renders as.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementType {
    /// A host node identified by its tag, e.g. `"div"`.
    Host(Rc<str>),
    /// A function component.
    Component(ComponentType),
    /// A keyed or unkeyed group of children without a host node.
    Fragment,
}

/// Immutable element record.
#[derive(Debug, Clone)]
pub struct Element {
    element_type: ElementType,
    key: Option<Key>,
    props: Rc<Props>,
}

impl Element {
    pub fn new(element_type: ElementType, key: Option<Key>, props: Props) -> Self {
        Self {
            element_type,
            key,
            props: Rc::new(props),
        }
    }

    /// A host element, e.g. `Element::host("div")`.
    pub fn host(tag: &str) -> Self {
        Self::new(ElementType::Host(tag.into()), None, Props::new())
    }

    /// A function component element.
    pub fn component<C: Component>(component: C) -> Self {
        Self::new(
            ElementType::Component(ComponentType::of(component)),
            None,
            Props::new(),
        )
    }

    /// A fragment wrapping `children`.
    pub fn fragment(children: impl Into<Child>) -> Self {
        let mut props = Props::new();
        props.set_children(children);
        Self::new(ElementType::Fragment, None, props)
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        Rc::make_mut(&mut self.props).set(name, value);
        self
    }

    /// Append one child. A single call yields a single child; further calls
    /// turn the children into a list.
    pub fn child(mut self, child: impl Into<Child>) -> Self {
        let child = child.into();
        let props = Rc::make_mut(&mut self.props);
        props.children = match std::mem::take(&mut props.children) {
            Child::Empty => child,
            Child::List(mut list) => {
                list.push(child);
                Child::List(list)
            }
            single => Child::List(vec![single, child]),
        };
        self
    }

    /// Replace the children with a list.
    pub fn children<I, C>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Child>,
    {
        let list = children.into_iter().map(Into::into).collect();
        Rc::make_mut(&mut self.props).children = Child::List(list);
        self
    }

    pub fn element_type(&self) -> &ElementType {
        &self.element_type
    }

    pub fn key_ref(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn props(&self) -> &Rc<Props> {
        &self.props
    }
}

// =============================================================================
// Children
// =============================================================================

/// The shape of `props.children`.
#[derive(Debug, Clone, Default)]
pub enum Child {
    #[default]
    Empty,
    Text(Rc<str>),
    Element(Element),
    List(Vec<Child>),
}

impl Child {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Text child.
pub fn text(content: impl fmt::Display) -> Child {
    Child::Text(content.to_string().into())
}

impl From<Element> for Child {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

impl From<&str> for Child {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

impl From<String> for Child {
    fn from(value: String) -> Self {
        Self::Text(value.into())
    }
}

impl From<i64> for Child {
    fn from(value: i64) -> Self {
        Self::Text(value.to_string().into())
    }
}

impl From<i32> for Child {
    fn from(value: i32) -> Self {
        Self::Text(value.to_string().into())
    }
}

impl From<()> for Child {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}
