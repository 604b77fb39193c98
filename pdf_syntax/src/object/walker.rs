//! Pre-order traversal of a value and everything it contains.
//!
//! The walker keeps its own stack, so arbitrarily deep values can be visited.
//! References are reported but not followed.

use crate::primitive::{Primitive, Dictionary, Name};
use super::PlainRef;

/// One item of a traversal: a value, or the dictionary of a stream.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Node<'a> {
    Object(&'a Primitive),
    StreamDict(&'a Dictionary),
}
impl<'a> Node<'a> {
    pub fn as_primitive(&self) -> Option<&'a Primitive> {
        match *self {
            Node::Object(p) => Some(p),
            Node::StreamDict(_) => None,
        }
    }
    /// The dictionary, for a dictionary value or the dictionary of a stream.
    pub fn as_dictionary(&self) -> Option<&'a Dictionary> {
        match *self {
            Node::Object(Primitive::Dictionary(d)) => Some(d),
            Node::StreamDict(d) => Some(d),
            _ => None,
        }
    }
    pub fn is_dictionary(&self) -> bool {
        self.as_dictionary().is_some()
    }
}

enum Children<'a> {
    Stream(Option<&'a Dictionary>),
    Dictionary(indexmap::map::Iter<'a, Name, Primitive>),
    Array(std::slice::Iter<'a, Primitive>),
}

struct SubWalker<'a> {
    node: Node<'a>,
    children: Children<'a>,
    started: bool,
}
impl<'a> SubWalker<'a> {
    fn new(node: Node<'a>) -> Option<SubWalker<'a>> {
        let children = match node {
            Node::Object(Primitive::Stream(s)) => Children::Stream(Some(&s.info)),
            Node::Object(Primitive::Dictionary(d)) => Children::Dictionary(d.iter()),
            Node::StreamDict(d) => Children::Dictionary(d.iter()),
            Node::Object(Primitive::Array(a)) => Children::Array(a.iter()),
            Node::Object(_) => return None,
        };
        Some(SubWalker { node, children, started: false })
    }

    /// The next child and the key it is stored under.
    fn next(&mut self) -> Option<(Node<'a>, Option<&'a Name>)> {
        let next = match self.children {
            Children::Stream(ref mut dict) => dict.take().map(|d| (Node::StreamDict(d), None)),
            Children::Dictionary(ref mut iter) => iter.next().map(|(k, v)| (Node::Object(v), Some(k))),
            Children::Array(ref mut iter) => iter.next().map(|v| (Node::Object(v), None)),
        };
        self.started = true;
        next
    }
}

/// Visits a value and then, depth first, everything inside it.
///
/// ```
/// let mut walker = ObjectWalker::new(&page);
/// while let Some(node) = walker.next() {
///     if walker.dict_key().map_or(false, |k| k == "Parent") {
///         walker.skip_current();
///     }
/// }
/// ```
pub struct ObjectWalker<'a> {
    next_node: Option<Node<'a>>,
    parent: Option<Node<'a>>,
    dict_key: Option<&'a Name>,
    depth: usize,
    stack: Vec<SubWalker<'a>>,
}
impl<'a> ObjectWalker<'a> {
    pub fn new(root: &'a Primitive) -> ObjectWalker<'a> {
        ObjectWalker {
            next_node: Some(Node::Object(root)),
            parent: None,
            dict_key: None,
            depth: 0,
            stack: vec![],
        }
    }

    /// The container of the node returned last. `None` for the root.
    pub fn parent(&self) -> Option<Node<'a>> {
        self.parent
    }

    /// The key under which the node returned last is stored, if its parent is a dictionary.
    pub fn dict_key(&self) -> Option<&'a Name> {
        self.dict_key
    }

    /// Nesting level of the node returned last; the root is at 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Don't descend into the node returned last.
    /// Has no effect once its children are being visited.
    pub fn skip_current(&mut self) {
        if let Some(top) = self.stack.last() {
            if !top.started {
                self.stack.pop();
            }
        }
    }
}
impl<'a> Iterator for ObjectWalker<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Node<'a>> {
        loop {
            if let Some(node) = self.next_node.take() {
                if let Some(sub) = SubWalker::new(node) {
                    self.stack.push(sub);
                }
                return Some(node);
            }
            let top = self.stack.last_mut()?;
            match top.next() {
                Some((child, key)) => {
                    self.parent = Some(top.node);
                    self.dict_key = if top.node.is_dictionary() { key } else { None };
                    self.next_node = Some(child);
                    self.depth = self.stack.len();
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Every reference inside `root`, in traversal order, including duplicates.
pub fn collect_references(root: &Primitive) -> Vec<PlainRef> {
    ObjectWalker::new(root)
        .filter_map(|node| match node {
            Node::Object(&Primitive::Reference(r)) => Some(r),
            _ => None,
        })
        .collect()
}
