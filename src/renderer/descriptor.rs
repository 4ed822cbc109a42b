//! Element descriptors - the compiled form of a declarative template.
//!
//! A [`Descriptor`] is an immutable "render this with these config
//! values and these children" value. Its type is a closed tagged
//! variant: a host tag, an erased component type, or a plain render
//! function; the renderer switches on the tag explicitly, never on
//! runtime type inspection. The reserved `key` config entry is
//! extracted at build time and carried separately for identity
//! tracking; `children` order is preserved verbatim into the receiving
//! component's config.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::component::ComponentType;
use crate::error::RenderError;
use crate::types::Value;

/// A plain render function: config in, descriptor out. Stateless and
/// never tracked by any registry.
pub type RenderFn = Rc<dyn Fn(&Config) -> Result<Descriptor, RenderError>>;

/// The reserved config entry carrying identity.
pub(crate) const KEY_FIELD: &str = "key";

// =============================================================================
// DescriptorType
// =============================================================================

/// What a descriptor resolves to, in resolution priority order.
#[derive(Clone)]
pub enum DescriptorType {
    /// A host element tag.
    Host(String),
    /// A component constructor, tracked by the owner's registry.
    Component(ComponentType),
    /// A stateless render function, resolved in place.
    Function(RenderFn),
}

impl fmt::Debug for DescriptorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorType::Host(tag) => f.debug_tuple("Host").field(tag).finish(),
            DescriptorType::Component(ty) => f.debug_tuple("Component").field(&ty.name()).finish(),
            DescriptorType::Function(_) => f.write_str("Function"),
        }
    }
}

impl PartialEq for DescriptorType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DescriptorType::Host(a), DescriptorType::Host(b)) => a == b,
            (DescriptorType::Component(a), DescriptorType::Component(b)) => a == b,
            (DescriptorType::Function(a), DescriptorType::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// =============================================================================
// Child
// =============================================================================

/// A descriptor child: a nested descriptor or a text primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    Node(Descriptor),
    Text(String),
}

impl Child {
    /// Configuration value of a nested descriptor child (the
    /// "read the data passed to a child" accessor).
    pub fn config_value(&self, name: &str) -> Value {
        match self {
            Child::Node(descriptor) => descriptor.get(name).cloned().unwrap_or(Value::Null),
            Child::Text(_) => Value::Null,
        }
    }

    pub fn as_descriptor(&self) -> Option<&Descriptor> {
        match self {
            Child::Node(descriptor) => Some(descriptor),
            Child::Text(_) => None,
        }
    }
}

impl From<Descriptor> for Child {
    fn from(descriptor: Descriptor) -> Self {
        Child::Node(descriptor)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.to_string())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text)
    }
}

// =============================================================================
// Descriptor
// =============================================================================

/// Immutable description of a node to render.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    ty: DescriptorType,
    key: Option<String>,
    config: BTreeMap<String, Value>,
    children: Vec<Child>,
}

impl Descriptor {
    fn new(ty: DescriptorType) -> Self {
        Self {
            ty,
            key: None,
            config: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Describe a host element.
    pub fn host(tag: impl Into<String>) -> Self {
        Self::new(DescriptorType::Host(tag.into()))
    }

    /// Describe a component by erased type.
    pub fn component(ty: ComponentType) -> Self {
        Self::new(DescriptorType::Component(ty))
    }

    /// Describe a component by concrete type.
    pub fn component_of<C: crate::component::Component>() -> Self {
        Self::component(ComponentType::of::<C>())
    }

    /// Describe a render-function invocation.
    pub fn function(
        f: impl Fn(&Config) -> Result<Descriptor, RenderError> + 'static,
    ) -> Self {
        Self::new(DescriptorType::Function(Rc::new(f)))
    }

    pub(crate) fn new_function(f: RenderFn) -> Self {
        Self::new(DescriptorType::Function(f))
    }

    /// Add a config entry. The reserved `key` name is extracted into the
    /// descriptor's identity instead of the config map.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        if name == KEY_FIELD {
            self.key = Some(value.to_text());
        } else {
            self.config.insert(name, value);
        }
        self
    }

    /// Set the identity key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Append one child.
    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append a text child.
    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(Child::Text(text.into()))
    }

    /// Append many children (e.g. received `config.children` passed
    /// through to the output).
    pub fn children(mut self, children: impl IntoIterator<Item = Child>) -> Self {
        self.children.extend(children);
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn ty(&self) -> &DescriptorType {
        &self.ty
    }

    /// Config value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.config.get(name)
    }

    pub fn descriptor_key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn child_list(&self) -> &[Child] {
        &self.children
    }

    pub(crate) fn config_entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.config.iter()
    }

    /// The configuration this descriptor delivers to its component:
    /// named values plus the ordered children list.
    pub(crate) fn to_config(&self) -> Config {
        Config {
            values: self.config.clone(),
            children: self.children.clone(),
        }
    }

    /// Merge an external config into this descriptor (the `render`
    /// entry-point's optional config argument). External values win;
    /// external children are used only when the descriptor has none.
    pub(crate) fn merged(mut self, config: Config) -> Self {
        let Config { values, children } = config;
        for (name, value) in values {
            self = self.with(name, value);
        }
        if self.children.is_empty() {
            self.children = children;
        }
        self
    }
}

// =============================================================================
// Config
// =============================================================================

/// Configuration received by a component: named values plus the ordered
/// children written in the owner's template.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub(crate) values: BTreeMap<String, Value>,
    pub(crate) children: Vec<Child>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style entry.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Value by name, `Null` when absent.
    pub fn value(&self, name: &str) -> Value {
        self.values.get(name).cloned().unwrap_or(Value::Null)
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.children.is_empty()
    }

    pub(crate) fn into_parts(self) -> (BTreeMap<String, Value>, Vec<Child>) {
        (self.values, self.children)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_extracted_from_config() {
        let descriptor = Descriptor::host("div").with("key", "item-1").with("class", "row");
        assert_eq!(descriptor.descriptor_key(), Some("item-1"));
        assert_eq!(descriptor.get("key"), None);
        assert_eq!(descriptor.get("class"), Some(&Value::from("row")));
    }

    #[test]
    fn test_children_order_preserved() {
        let descriptor = Descriptor::host("ul")
            .child(Descriptor::host("li").text("a"))
            .text("between")
            .child(Descriptor::host("li").text("b"));

        let children = descriptor.child_list();
        assert_eq!(children.len(), 3);
        assert!(matches!(&children[1], Child::Text(t) if t == "between"));

        let config = descriptor.to_config();
        assert_eq!(config.children(), children);
    }

    #[test]
    fn test_child_config_value() {
        let child: Child = Descriptor::host("span").with("foo", "bar").into();
        assert_eq!(child.config_value("foo"), Value::from("bar"));
        assert_eq!(child.config_value("missing"), Value::Null);
        assert_eq!(Child::from("text").config_value("foo"), Value::Null);
    }

    #[test]
    fn test_merged_values_win_children_fallback() {
        let descriptor = Descriptor::host("div").with("a", 1i64);
        let merged = descriptor.merged(
            Config::new().with("a", 2i64).with("key", "k"),
        );
        assert_eq!(merged.get("a"), Some(&Value::Int(2)));
        assert_eq!(merged.descriptor_key(), Some("k"));
    }

    #[test]
    fn test_function_descriptor_resolves() {
        let descriptor = Descriptor::function(|config| {
            Ok(Descriptor::host("div").text(config.value("foo").to_text()))
        })
        .with("foo", "x");

        match descriptor.ty() {
            DescriptorType::Function(f) => {
                let produced = f(&descriptor.to_config()).unwrap();
                assert!(matches!(produced.ty(), DescriptorType::Host(tag) if tag == "div"));
            }
            _ => panic!("expected function descriptor"),
        }
    }
}
