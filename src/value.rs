//! The value tree produced by a parse, and the arena that owns it.
//!
//! Every node — primitive or composite — lives in one of two index-
//! addressed [`Pool`]s owned by [`Document`]. Composite children are a
//! singly-linked list threaded through the nodes themselves, built by
//! *prepending* each new child (§3, §4.4 "Primitive insertion"): an array
//! `[e1, .., en]` has its children linked `en -> .. -> e1`, and an object
//! `{k1:v1, .., kn:vn}` is linked `vn -> kn -> .. -> v1 -> k1`. This is an
//! implementation choice for hot-path efficiency (prepend is O(1)), carried
//! over unchanged from the reference design (Design Notes §9).
//!
//! Every composite additionally threads onto a second, parse-global list —
//! `reverse_nesting_order` — in the order composites were opened. Since
//! composite ids are assigned in that same order (the outermost composite
//! of a parse is always opened, hence numbered, first), walking this
//! thread from the most recently opened composite back to id 1 visits
//! every composite in the tree exactly once, innermost-first, without
//! recursion.
//!
//! This thread is a diagnostic/traversal aid, not a parse's primary
//! result: [`crate::parser::Parser::parse`] returns the *structural*
//! root (the outermost composite, pool index 0 — see Design Notes §9,
//! "reverse-nesting list vs. back-pointers"), while [`Document::thread_head`]
//! gives the thread's own head for callers that want the flat,
//! innermost-first walk the reference implementation's dump routines use.

use crate::arena::{ByteArena, ByteSpan, Pool};

/// The tag of a parsed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Int64,
    Double,
    String,
    Bool,
    Null,
    Array,
    Object,
}

/// A reference to one primitive or composite node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    Primitive(u32),
    Composite(u32),
}

/// A reference to the value produced by a parse: either a lone primitive
/// (e.g. the whole input was `"123"`) or a composite tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRef {
    Primitive(u32),
    Composite(u32),
}

impl From<NodeRef> for ValueRef {
    fn from(node: NodeRef) -> Self {
        match node {
            NodeRef::Primitive(id) => ValueRef::Primitive(id),
            NodeRef::Composite(id) => ValueRef::Composite(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Primitive {
    Int64(i64),
    Double(f64),
    Str(ByteSpan),
    Bool(bool),
    Null,
}

pub(crate) struct PrimitiveNode {
    pub value: Primitive,
    /// Previous (earlier-inserted) sibling in the child list this node was
    /// prepended to, if any.
    pub next: Option<NodeRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompositeTag {
    Array,
    Object,
}

pub(crate) struct CompositeNode {
    pub tag: CompositeTag,
    pub id: u32,
    pub child_head: Option<NodeRef>,
    pub child_count: u32,
    /// Link to the composite opened immediately before this one, forming
    /// the parse-global reverse-nesting thread.
    pub reverse_nesting_order: Option<u32>,
    /// Previous sibling in the child list this composite was prepended to
    /// once it was popped and inserted into its parent, if any.
    pub next: Option<NodeRef>,
}

/// Owns every node and string payload produced by a parse.
///
/// A `Document` is reused across parses on the same [`crate::parser::Parser`]
/// handle: [`Document::reset`] releases all nodes and string bytes except
/// the arena's first chunk, matching [`crate::arena::ByteArena::reset`].
pub struct Document {
    pub(crate) bytes: ByteArena,
    pub(crate) primitives: Pool<PrimitiveNode>,
    pub(crate) composites: Pool<CompositeNode>,
}

impl Document {
    pub fn create() -> Self {
        Self {
            bytes: ByteArena::create(),
            primitives: Pool::new(),
            composites: Pool::new(),
        }
    }

    pub fn reset(&mut self) {
        self.bytes.reset();
        self.primitives.reset();
        self.composites.reset();
    }

    /// The tag of the referenced node.
    pub fn tag(&self, value: ValueRef) -> Tag {
        match value {
            ValueRef::Primitive(id) => match self.primitives.get(id).value {
                Primitive::Int64(_) => Tag::Int64,
                Primitive::Double(_) => Tag::Double,
                Primitive::Str(_) => Tag::String,
                Primitive::Bool(_) => Tag::Bool,
                Primitive::Null => Tag::Null,
            },
            ValueRef::Composite(id) => match self.composites.get(id).tag {
                CompositeTag::Array => Tag::Array,
                CompositeTag::Object => Tag::Object,
            },
        }
    }

    pub fn as_i64(&self, id: u32) -> Option<i64> {
        match self.primitives.get(id).value {
            Primitive::Int64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self, id: u32) -> Option<f64> {
        match self.primitives.get(id).value {
            Primitive::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self, id: u32) -> Option<bool> {
        match self.primitives.get(id).value {
            Primitive::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self, id: u32) -> Option<&str> {
        match self.primitives.get(id).value {
            Primitive::Str(span) => std::str::from_utf8(self.bytes.get(span)).ok(),
            _ => None,
        }
    }

    pub fn is_null(&self, id: u32) -> bool {
        matches!(self.primitives.get(id).value, Primitive::Null)
    }

    /// Number of direct children of a composite.
    pub fn child_count(&self, id: u32) -> u32 {
        self.composites.get(id).child_count
    }

    /// The composite id (assigned in allocation order, starting at 1).
    pub fn composite_id(&self, id: u32) -> u32 {
        self.composites.get(id).id
    }

    /// Iterates a composite's children in the reversed order they were
    /// parsed in (§3: array `en..e1`, object `vn,kn..v1,k1`).
    pub fn children(&self, id: u32) -> Children<'_> {
        Children {
            doc: self,
            next: self.composites.get(id).child_head,
        }
    }

    /// Iterates every composite belonging to a parse, innermost-first,
    /// starting from `root` and ending at the composite with id 1. See
    /// module docs for why this list exists.
    pub fn reverse_nesting_order(&self, root: u32) -> ReverseNesting<'_> {
        ReverseNesting {
            doc: self,
            next: Some(root),
        }
    }

    /// The most recently allocated composite of the current parse — the
    /// head of the `reverse_nesting_order` thread, and the innermost
    /// composite opened anywhere in the tree. `None` if no composite has
    /// been allocated since the last reset.
    ///
    /// This is distinct from a parse's structural root (the `ValueRef`
    /// returned by [`crate::parser::Parser::parse`]): pass this to
    /// [`Document::reverse_nesting_order`] to walk every composite in the
    /// tree without recursion.
    pub fn thread_head(&self) -> Option<u32> {
        if self.composites.is_empty() {
            None
        } else {
            Some(self.composites.len() as u32 - 1)
        }
    }
}

pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeRef>,
}

impl<'a> Iterator for Children<'a> {
    type Item = ValueRef;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        self.next = match cur {
            NodeRef::Primitive(id) => self.doc.primitives.get(id).next,
            NodeRef::Composite(id) => self.doc.composites.get(id).next,
        };
        Some(cur.into())
    }
}

pub struct ReverseNesting<'a> {
    doc: &'a Document,
    next: Option<u32>,
}

impl<'a> Iterator for ReverseNesting<'a> {
    type Item = u32;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        self.next = self.doc.composites.get(cur).reverse_nesting_order;
        Some(cur)
    }
}
