//! Virtual node model
//!
//! Immutable snapshot nodes, created once per render cycle and shared by
//! reference. Each element precomputes its descendant count so that patch
//! application can skip whole subtrees by index range.
//!
//! Attributes arrive as a flat ordered `Fact` list and are normalized into
//! five categories (styles, events, properties, attributes, namespaced
//! attributes) by [`organize_facts`].
//!
//! Author: Moroya Sakamoto

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::VNodeError;
use crate::live::{LiveId, LiveTree};

/// Application message produced by event handlers.
pub type Message = Box<dyn Any>;

/// Collapsed tagger chain, outermost mapper first.
pub type Mappers = SmallVec<[Mapper; 2]>;

macro_rules! shared_fn {
    ($(#[$meta:meta])* $name:ident, $inner:ty) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name(Rc<$inner>);

        impl $name {
            /// Two handles are the same only if they share one allocation.
            pub fn same(&self, other: &Self) -> bool {
                Rc::ptr_eq(&self.0, &other.0)
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.same(other)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:p})"), Rc::as_ptr(&self.0))
            }
        }
    };
}

shared_fn!(
    /// Event handler: event payload in, optional message out.
    Handler,
    dyn Fn(&dyn Any) -> Option<Message>
);

shared_fn!(
    /// Message mapper carried by a tagger node.
    Mapper,
    dyn Fn(Message) -> Message
);

shared_fn!(
    /// Builds the content of a custom node into the live tree.
    RenderFn,
    dyn Fn(&dyn Any, &mut LiveTree) -> LiveId
);

shared_fn!(
    /// Compares two custom-node models; `Some` carries the patch to apply.
    CustomDiff,
    dyn Fn(&dyn Any, &dyn Any) -> Option<CustomPatch>
);

shared_fn!(
    /// Caller-defined mutation of a custom node; returns the node that now
    /// stands in its place.
    CustomPatch,
    dyn Fn(&mut LiveTree, LiveId) -> LiveId
);

shared_fn!(
    /// Lazy builder of a thunk's content.
    Builder,
    dyn Fn() -> VNode
);

impl Handler {
    pub fn new(f: impl Fn(&dyn Any) -> Option<Message> + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: &dyn Any) -> Option<Message> {
        (self.0)(event)
    }
}

impl Mapper {
    pub fn new(f: impl Fn(Message) -> Message + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, message: Message) -> Message {
        (self.0)(message)
    }
}

impl RenderFn {
    pub fn new(f: impl Fn(&dyn Any, &mut LiveTree) -> LiveId + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, model: &dyn Any, tree: &mut LiveTree) -> LiveId {
        (self.0)(model, tree)
    }
}

impl CustomDiff {
    pub fn new(f: impl Fn(&dyn Any, &dyn Any) -> Option<CustomPatch> + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, old: &dyn Any, new: &dyn Any) -> Option<CustomPatch> {
        (self.0)(old, new)
    }
}

impl CustomPatch {
    pub fn new(f: impl Fn(&mut LiveTree, LiveId) -> LiveId + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, tree: &mut LiveTree, node: LiveId) -> LiveId {
        (self.0)(tree, node)
    }
}

impl Builder {
    pub fn new(f: impl Fn() -> VNode + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self) -> VNode {
        (self.0)()
    }
}

/// Thunk argument compared by identity.
///
/// `Ref` compares allocations, never contents. Scalars compare by value.
#[derive(Clone)]
pub enum Identity {
    Ref(Rc<dyn Any>),
    Int(i64),
    Text(Rc<str>),
}

impl Identity {
    /// Identity of an existing shared value.
    pub fn of<T: 'static>(value: &Rc<T>) -> Self {
        let shared: Rc<dyn Any> = Rc::clone(value) as Rc<dyn Any>;
        Self::Ref(shared)
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Ref(a), Self::Ref(b)) => Rc::ptr_eq(a, b),
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ref(value) => write!(f, "Ref({:p})", Rc::as_ptr(value)),
            Self::Int(value) => write!(f, "Int({value})"),
            Self::Text(value) => write!(f, "Text({value:?})"),
        }
    }
}

impl From<i64> for Identity {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::Text(Rc::from(value))
    }
}

/// Property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// No value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value
    Text(String),
}

impl PropValue {
    /// Value written when the property disappears from the new facts.
    pub fn cleared(&self) -> PropValue {
        match self {
            PropValue::Text(_) => PropValue::Text(String::new()),
            _ => PropValue::Null,
        }
    }

    /// True for values that leave the property unset on the host.
    pub fn is_clearing(&self) -> bool {
        match self {
            PropValue::Null => true,
            PropValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Text(String::from(value))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Text(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

/// Namespaced attribute value
#[derive(Debug, Clone, PartialEq)]
pub struct NsValue {
    pub namespace: String,
    pub value: String,
}

/// One entry of an element's attribute list, before organization.
#[derive(Debug, Clone)]
pub enum Fact {
    Style { key: String, value: String },
    Event { name: String, handler: Handler },
    Property { key: String, value: PropValue },
    Attribute { key: String, value: String },
    AttributeNs { namespace: String, key: String, value: String },
}

/// Attribute whose values are URIs and may smuggle script.
const URI_ATTRIBUTES: &[&str] = &["href", "src", "action", "formaction", "xlink:href"];

pub fn style(key: &str, value: &str) -> Fact {
    Fact::Style {
        key: String::from(key),
        value: String::from(value),
    }
}

/// Listener fact; keep the `Handler` around and pass clones to reuse it
/// across snapshots without a facts patch.
pub fn on(name: &str, handler: Handler) -> Fact {
    Fact::Event {
        name: String::from(name),
        handler,
    }
}

pub fn property(key: &str, value: impl Into<PropValue>) -> Fact {
    Fact::Property {
        key: no_script_property(key),
        value: value.into(),
    }
}

pub fn attribute(key: &str, value: &str) -> Fact {
    let value = if URI_ATTRIBUTES.contains(&key.to_ascii_lowercase().as_str()) {
        no_javascript_uri(value)
    } else {
        String::from(value)
    };
    Fact::Attribute {
        key: no_on_or_form_action(key),
        value,
    }
}

pub fn attribute_ns(namespace: &str, key: &str, value: &str) -> Fact {
    Fact::AttributeNs {
        namespace: String::from(namespace),
        key: no_on_or_form_action(key),
        value: String::from(value),
    }
}

/// `class` attribute; repeated classes on one element accumulate.
pub fn class(name: &str) -> Fact {
    attribute("class", name)
}

fn no_script(tag: &str) -> String {
    if tag.eq_ignore_ascii_case("script") {
        String::from("p")
    } else {
        String::from(tag)
    }
}

fn no_on_or_form_action(key: &str) -> String {
    let lower = key.to_ascii_lowercase();
    if lower.starts_with("on") || lower == "formaction" {
        format!("data-{key}")
    } else {
        String::from(key)
    }
}

fn no_script_property(key: &str) -> String {
    if key == "innerHTML" || key == "formAction" || key.to_ascii_lowercase().starts_with("on") {
        format!("data-{key}")
    } else {
        String::from(key)
    }
}

fn no_javascript_uri(value: &str) -> String {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    let scripted = compact
        .get(..11)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("javascript:"));
    if scripted {
        String::new()
    } else {
        String::from(value)
    }
}

/// Categorized facts of one node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Facts {
    pub styles: IndexMap<String, String>,
    pub events: IndexMap<String, Handler>,
    pub properties: IndexMap<String, PropValue>,
    pub attributes: IndexMap<String, String>,
    pub ns_attributes: IndexMap<String, NsValue>,
}

impl Facts {
    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
            && self.events.is_empty()
            && self.properties.is_empty()
            && self.attributes.is_empty()
            && self.ns_attributes.is_empty()
    }
}

/// Normalize a flat attribute list into categorized facts.
///
/// Later entries overwrite earlier ones with the same category and key,
/// except the `class` attribute and `className` property, which join with
/// a single space.
pub fn organize_facts(list: impl IntoIterator<Item = Fact>) -> Facts {
    let mut facts = Facts::default();
    for fact in list {
        match fact {
            Fact::Style { key, value } => {
                facts.styles.insert(key, value);
            }
            Fact::Event { name, handler } => {
                facts.events.insert(name, handler);
            }
            Fact::Property { key, value } => add_property(&mut facts.properties, key, value),
            Fact::Attribute { key, value } => {
                if key == "class" {
                    add_class(&mut facts.attributes, key, value);
                } else {
                    facts.attributes.insert(key, value);
                }
            }
            Fact::AttributeNs {
                namespace,
                key,
                value,
            } => {
                facts
                    .ns_attributes
                    .insert(key, NsValue { namespace, value });
            }
        }
    }
    facts
}

fn add_property(map: &mut IndexMap<String, PropValue>, key: String, value: PropValue) {
    if key == "className" {
        if let (PropValue::Text(name), Some(PropValue::Text(existing))) = (&value, map.get_mut(&key)) {
            if !existing.is_empty() {
                existing.push(' ');
                existing.push_str(name);
                return;
            }
        }
    }
    map.insert(key, value);
}

fn add_class(map: &mut IndexMap<String, String>, key: String, name: String) {
    match map.get_mut(&key) {
        Some(existing) if !existing.is_empty() => {
            existing.push(' ');
            existing.push_str(&name);
        }
        _ => {
            map.insert(key, name);
        }
    }
}

/// Plain element
#[derive(Debug)]
pub struct Element {
    pub tag: String,
    pub namespace: Option<String>,
    pub facts: Facts,
    pub children: Vec<VNode>,
    pub descendants: usize,
}

/// Element whose children carry identity keys
#[derive(Debug)]
pub struct KeyedElement {
    pub tag: String,
    pub namespace: Option<String>,
    pub facts: Facts,
    pub children: Vec<(String, VNode)>,
    pub descendants: usize,
}

/// Self-contained component with its own render and diff logic
#[derive(Debug)]
pub struct Custom {
    pub facts: Facts,
    pub model: Rc<dyn Any>,
    pub render: RenderFn,
    pub diff: CustomDiff,
}

/// Wrapper remapping messages produced inside `child`
#[derive(Debug)]
pub struct Tagger {
    pub mapper: Mapper,
    pub child: VNode,
    pub descendants: usize,
}

/// Memoized lazy node
#[derive(Debug)]
pub struct Thunk {
    pub args: Vec<Identity>,
    pub build: Builder,
    cached: RefCell<Option<VNode>>,
}

impl Thunk {
    /// Build the content once and cache it.
    pub fn force(&self) -> VNode {
        let cached = self.cached.borrow().clone();
        if let Some(child) = cached {
            return child;
        }
        let child = self.build.call();
        *self.cached.borrow_mut() = Some(child.clone());
        child
    }

    pub fn is_forced(&self) -> bool {
        self.cached.borrow().is_some()
    }

    /// Take over content built by an earlier thunk with the same arguments.
    pub(crate) fn adopt(&self, child: VNode) {
        *self.cached.borrow_mut() = Some(child);
    }

    /// Element-wise identity comparison of the arguments.
    pub fn same_args(&self, other: &Thunk) -> bool {
        self.args.len() == other.args.len()
            && self.args.iter().zip(&other.args).all(|(a, b)| a == b)
    }
}

/// The closed set of node shapes.
#[derive(Debug)]
pub enum VNodeKind {
    Text(String),
    Element(Element),
    KeyedElement(KeyedElement),
    Custom(Custom),
    Tagger(Tagger),
    Thunk(Thunk),
}

/// Shared handle to an immutable virtual node.
#[derive(Clone)]
pub struct VNode(Rc<VNodeKind>);

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl VNode {
    fn from_kind(kind: VNodeKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::from_kind(VNodeKind::Text(text.into()))
    }

    pub fn element(tag: &str, facts: Vec<Fact>, children: Vec<VNode>) -> Self {
        Self::element_ns(None, tag, facts, children)
    }

    pub fn element_ns(
        namespace: Option<&str>,
        tag: &str,
        facts: Vec<Fact>,
        children: Vec<VNode>,
    ) -> Self {
        let descendants = children.iter().map(|c| 1 + c.descendants()).sum();
        Self::from_kind(VNodeKind::Element(Element {
            tag: no_script(tag),
            namespace: namespace.map(String::from),
            facts: organize_facts(facts),
            children,
            descendants,
        }))
    }

    /// Keyed element. A key may appear at most twice.
    pub fn keyed(
        tag: &str,
        facts: Vec<Fact>,
        children: Vec<(String, VNode)>,
    ) -> Result<Self, VNodeError> {
        Self::keyed_ns(None, tag, facts, children)
    }

    pub fn keyed_ns(
        namespace: Option<&str>,
        tag: &str,
        facts: Vec<Fact>,
        children: Vec<(String, VNode)>,
    ) -> Result<Self, VNodeError> {
        check_keys(&children)?;
        let descendants = children.iter().map(|(_, c)| 1 + c.descendants()).sum();
        Ok(Self::from_kind(VNodeKind::KeyedElement(KeyedElement {
            tag: no_script(tag),
            namespace: namespace.map(String::from),
            facts: organize_facts(facts),
            children,
            descendants,
        })))
    }

    pub fn custom(facts: Vec<Fact>, model: Rc<dyn Any>, render: RenderFn, diff: CustomDiff) -> Self {
        Self::from_kind(VNodeKind::Custom(Custom {
            facts: organize_facts(facts),
            model,
            render,
            diff,
        }))
    }

    /// Wrap in a tagger so messages from this subtree pass through `mapper`.
    pub fn map(self, mapper: Mapper) -> Self {
        let descendants = 1 + self.descendants();
        Self::from_kind(VNodeKind::Tagger(Tagger {
            mapper,
            child: self,
            descendants,
        }))
    }

    /// Lazy node rebuilt only when `args` change identity.
    pub fn lazy(args: Vec<Identity>, build: impl Fn() -> VNode + 'static) -> Self {
        Self::from_kind(VNodeKind::Thunk(Thunk {
            args,
            build: Builder::new(build),
            cached: RefCell::new(None),
        }))
    }

    pub fn kind(&self) -> &VNodeKind {
        &self.0
    }

    /// Number of nodes below this one in the flat index space.
    pub fn descendants(&self) -> usize {
        match self.kind() {
            VNodeKind::Element(el) => el.descendants,
            VNodeKind::KeyedElement(el) => el.descendants,
            VNodeKind::Tagger(tagger) => tagger.descendants,
            VNodeKind::Text(_) | VNodeKind::Custom(_) | VNodeKind::Thunk(_) => 0,
        }
    }

    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Collapse a chain of taggers into its mappers and the wrapped node.
    pub fn untag(&self) -> (Mappers, &VNode) {
        let mut mappers = Mappers::new();
        let mut current = self;
        while let VNodeKind::Tagger(tagger) = current.kind() {
            mappers.push(tagger.mapper.clone());
            current = &tagger.child;
        }
        (mappers, current)
    }

    /// Children of an element in order, keys dropped.
    pub fn child_nodes(&self) -> ChildNodes<'_> {
        match self.kind() {
            VNodeKind::Element(el) => ChildNodes::Plain(el.children.iter()),
            VNodeKind::KeyedElement(el) => ChildNodes::Keyed(el.children.iter()),
            _ => ChildNodes::Empty,
        }
    }
}

/// Iterator over element children regardless of keying.
pub enum ChildNodes<'a> {
    Plain(std::slice::Iter<'a, VNode>),
    Keyed(std::slice::Iter<'a, (String, VNode)>),
    Empty,
}

impl<'a> Iterator for ChildNodes<'a> {
    type Item = &'a VNode;

    fn next(&mut self) -> Option<&'a VNode> {
        match self {
            ChildNodes::Plain(iter) => iter.next(),
            ChildNodes::Keyed(iter) => iter.next().map(|(_, node)| node),
            ChildNodes::Empty => None,
        }
    }
}

fn check_keys(children: &[(String, VNode)]) -> Result<(), VNodeError> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (key, _) in children {
        let count = counts.entry(key.as_str()).or_insert(0);
        *count += 1;
        if *count > 2 {
            return Err(VNodeError::DuplicateKey {
                key: key.clone(),
                count: *count,
            });
        }
    }
    Ok(())
}
