//! Address Space — the static tree of addressable nodes.
//!
//! Every node lives at a dotted numeric path (`0`, `0.5`, `0.5.1`). The tree
//! is built once from a catalog and never mutated afterwards; lookups are
//! exact-match on the full path.

use crate::error::AddressError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// A dotted path of non-negative integers, e.g. `0.5.1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(Vec<u32>);

impl Address {
    /// The conventional root address `0`.
    pub fn root() -> Self {
        Self(vec![0])
    }

    pub fn segments(&self) -> &[u32] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// The enclosing node's address, `None` for top-level addresses.
    pub fn parent(&self) -> Option<Address> {
        if self.0.len() <= 1 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// The address of this node's child with the given last segment.
    pub fn child(&self, segment: u32) -> Address {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    /// Last path segment.
    pub fn last(&self) -> u32 {
        self.0.last().copied().unwrap_or_default()
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AddressError::Invalid(s.to_string()));
        }
        let segments = s
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(AddressError::Invalid(s.to_string()));
                }
                part.parse::<u32>()
                    .map_err(|_| AddressError::Invalid(s.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(segments))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Declared type of a handler argument. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    #[serde(alias = "str")]
    String,
    #[serde(alias = "int")]
    Integer,
    #[serde(alias = "float")]
    Number,
    #[serde(alias = "bool")]
    Boolean,
    #[serde(alias = "dict")]
    Object,
    #[serde(alias = "list")]
    Array,
    Any,
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArgType::String => "string",
            ArgType::Integer => "integer",
            ArgType::Number => "number",
            ArgType::Boolean => "boolean",
            ArgType::Object => "object",
            ArgType::Array => "array",
            ArgType::Any => "any",
        };
        f.write_str(name)
    }
}

/// A single addressable node in the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub address: Address,

    /// Human-readable label shown in menus
    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Handler invoked when this node executes. Nodes without one are menus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler_id: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arg_schema: BTreeMap<String, ArgType>,
}

impl Node {
    /// A menu node (no handler).
    pub fn menu(address: Address, label: impl Into<String>) -> Self {
        Self {
            address,
            label: label.into(),
            description: None,
            handler_id: None,
            arg_schema: BTreeMap::new(),
        }
    }

    /// An action node bound to a handler.
    pub fn action(address: Address, label: impl Into<String>, handler_id: impl Into<String>) -> Self {
        Self {
            handler_id: Some(handler_id.into()),
            ..Self::menu(address, label)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_arg(mut self, name: impl Into<String>, ty: ArgType) -> Self {
        self.arg_schema.insert(name.into(), ty);
        self
    }

    pub fn is_menu(&self) -> bool {
        self.handler_id.is_none()
    }
}

/// One selectable entry in a rendered [`Menu`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuOption {
    /// The shortcut digit that selects this option
    pub option: u32,
    pub address: Address,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler_id: Option<String>,
}

/// A node together with its ordered children, for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Menu {
    pub address: Address,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, ArgType>,
    pub options: Vec<MenuOption>,
}

/// The immutable lookup table from address to node.
#[derive(Debug, Clone, Default)]
pub struct AddressSpace {
    nodes: HashMap<Address, Node>,
    /// Addresses in insertion order
    order: Vec<Address>,
    children: HashMap<Address, Vec<Address>>,
}

impl AddressSpace {
    pub fn builder() -> AddressSpaceBuilder {
        AddressSpaceBuilder::default()
    }

    /// Exact-match lookup.
    pub fn resolve(&self, address: &Address) -> Option<&Node> {
        self.nodes.get(address)
    }

    /// Children of `address` in declaration order.
    pub fn children_of(&self, address: &Address) -> Vec<&Node> {
        self.children
            .get(address)
            .map(|kids| kids.iter().filter_map(|a| self.nodes.get(a)).collect())
            .unwrap_or_default()
    }

    /// All nodes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|a| self.nodes.get(a))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The first declared top-level node, usually `0`.
    pub fn root(&self) -> Option<&Node> {
        self.iter().find(|n| n.address.depth() == 1)
    }

    /// Render the menu for a node.
    pub fn menu(&self, address: &Address) -> Option<Menu> {
        let node = self.resolve(address)?;
        let options = self
            .children_of(address)
            .into_iter()
            .map(|child| MenuOption {
                option: child.address.last(),
                address: child.address.clone(),
                label: child.label.clone(),
                handler_id: child.handler_id.clone(),
            })
            .collect();
        Some(Menu {
            address: node.address.clone(),
            label: node.label.clone(),
            description: node.description.clone(),
            args: node.arg_schema.clone(),
            options,
        })
    }
}

/// Collects nodes and validates the tree invariants before freezing it.
#[derive(Debug, Default)]
pub struct AddressSpaceBuilder {
    space: AddressSpace,
}

impl AddressSpaceBuilder {
    /// Add a node. Its parent must already be present.
    pub fn insert(&mut self, node: Node) -> Result<&mut Self, AddressError> {
        let address = node.address.clone();
        if self.space.nodes.contains_key(&address) {
            return Err(AddressError::Duplicate(address.to_string()));
        }
        if let Some(parent) = address.parent() {
            if !self.space.nodes.contains_key(&parent) {
                return Err(AddressError::MissingParent {
                    address: address.to_string(),
                    parent: parent.to_string(),
                });
            }
            self.space
                .children
                .entry(parent)
                .or_default()
                .push(address.clone());
        }
        self.space.order.push(address.clone());
        self.space.nodes.insert(address, node);
        Ok(self)
    }

    pub fn node(mut self, node: Node) -> Result<Self, AddressError> {
        self.insert(node)?;
        Ok(self)
    }

    pub fn build(self) -> AddressSpace {
        self.space
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    fn sample() -> AddressSpace {
        AddressSpace::builder()
            .node(Node::menu(addr("0"), "Root"))
            .unwrap()
            .node(Node::menu(addr("0.5"), "Tools"))
            .unwrap()
            .node(Node::action(addr("0.5.2"), "List tools", "list_tools"))
            .unwrap()
            .node(Node::action(addr("0.5.1"), "Run tool", "tool_call"))
            .unwrap()
            .node(Node::menu(addr("0.1"), "Conversation"))
            .unwrap()
            .build()
    }

    #[test]
    fn address_parse_and_display() {
        let a = addr("0.5.1");
        assert_eq!(a.segments(), &[0, 5, 1]);
        assert_eq!(a.to_string(), "0.5.1");
        assert_eq!(a.parent(), Some(addr("0.5")));
        assert_eq!(addr("0").parent(), None);
        assert_eq!(addr("0.5").child(3), addr("0.5.3"));
    }

    #[test]
    fn address_rejects_malformed() {
        for bad in ["", ".", "0.", ".1", "0..1", "a.b", "0.-1", "0.1x", " 0"] {
            assert!(bad.parse::<Address>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn address_serde_as_string() {
        let json = serde_json::to_string(&addr("0.1.2")).unwrap();
        assert_eq!(json, "\"0.1.2\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr("0.1.2"));
        assert!(serde_json::from_str::<Address>("\"x\"").is_err());
    }

    #[test]
    fn resolve_exact_match_only() {
        let space = sample();
        assert_eq!(space.resolve(&addr("0.5.1")).unwrap().label, "Run tool");
        assert!(space.resolve(&addr("0.5.9")).is_none());
        assert!(space.resolve(&addr("9.9.9")).is_none());
        assert!(space.resolve(&addr("0.5.1.0")).is_none());
    }

    #[test]
    fn children_in_insertion_order() {
        let space = sample();
        let labels: Vec<_> = space
            .children_of(&addr("0"))
            .iter()
            .map(|n| n.label.as_str())
            .collect();
        assert_eq!(labels, vec!["Tools", "Conversation"]);

        let kids: Vec<_> = space
            .children_of(&addr("0.5"))
            .iter()
            .map(|n| n.address.to_string())
            .collect();
        assert_eq!(kids, vec!["0.5.2", "0.5.1"]);
        assert!(space.children_of(&addr("0.5.1")).is_empty());
    }

    #[test]
    fn builder_rejects_duplicates_and_orphans() {
        let mut builder = AddressSpace::builder();
        builder.insert(Node::menu(addr("0"), "Root")).unwrap();
        assert_eq!(
            builder.insert(Node::menu(addr("0"), "Again")).unwrap_err(),
            AddressError::Duplicate("0".into())
        );
        assert!(matches!(
            builder.insert(Node::menu(addr("0.3.1"), "Orphan")),
            Err(AddressError::MissingParent { .. })
        ));
    }

    #[test]
    fn menu_lists_options() {
        let space = sample();
        let menu = space.menu(&addr("0.5")).unwrap();
        assert_eq!(menu.label, "Tools");
        assert_eq!(menu.options.len(), 2);
        assert_eq!(menu.options[1].option, 1);
        assert_eq!(menu.options[1].handler_id.as_deref(), Some("tool_call"));
        assert_eq!(space.root().unwrap().address, addr("0"));
    }
}
