//! Recursive-descent-over-an-explicit-stack driver (spec.md §4.4).
//!
//! [`Parser`] owns a [`Document`] (the arena-backed value tree for one
//! parse) and drives the [`Lexer`] through an explicit stack of open
//! composite frames — never host recursion, so attacker-controlled nesting
//! depth can only grow the `Vec<Frame>` (bounded by
//! [`crate::config::ParseConfig::max_depth`]), not the call stack.
//!
//! Each frame tracks which element of its composite it's expecting next
//! (`ArrayState`/`ObjectState`, mirroring `parse_array.c`/`parse_hashtab.c`'s
//! `PA_STATE`/`PHT_STATE`). Opening a nested composite "suspends" the
//! current frame (its state is updated to whatever it should resume as) and
//! returns control to the driver loop in [`Parser::parse`], which now finds
//! the new composite on top of the stack and continues from there — there
//! is no separate "resume" entry point to call back into, since the state
//! update already encodes what to do next.

use crate::arena::ByteArena;
use crate::config::{DepthGuard, ParseConfig};
use crate::error::{JsonError, JsonResult};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::value::{CompositeNode, CompositeTag, Document, NodeRef, Primitive, PrimitiveNode, ValueRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayState {
    AwaitingFirst,
    AwaitingMore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectState {
    AwaitingFirst,
    AwaitingMore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Array(ArrayState),
    Object(ObjectState),
}

/// One open composite on the parser's explicit stack.
struct Frame {
    /// Pool index of the composite this frame is building.
    composite: u32,
    state: FrameState,
}

/// Outcome of reading one array element token (spec.md §4.4.1).
enum ElementOutcome {
    Primitive(Primitive),
    OpenArray,
    OpenObject,
    Close,
}

/// Outcome of reading one object key/value pair (spec.md §4.4.2).
enum KeyValueOutcome {
    Done,
    OpenArray,
    OpenObject,
    Close,
}

/// Drives a [`Lexer`] over one byte buffer into a [`Document`].
///
/// A `Parser` is reused across many parses: [`Parser::parse`] resets its
/// `Document` before doing any work, matching the reference `jp_parse`
/// contract of resetting the pool and re-initialising the scanner on every
/// call.
pub struct Parser {
    document: Document,
    config: ParseConfig,
    depth: DepthGuard,
    stack: Vec<Frame>,
}

impl Parser {
    pub fn new() -> Self {
        Self::with_config(ParseConfig::default())
    }

    pub fn with_config(config: ParseConfig) -> Self {
        Self {
            document: Document::create(),
            config,
            depth: DepthGuard::new(),
            stack: Vec::new(),
        }
    }

    /// Releases all memory except the arena's first chunk, as if the
    /// handle had just been created. Called automatically at the start of
    /// every [`Parser::parse`]; exposed separately so a caller can release
    /// memory between batches without immediately starting a new parse.
    pub fn reset(&mut self) {
        self.document.reset();
        self.depth.reset();
        self.stack.clear();
    }

    /// The value tree produced by the most recent successful parse.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Consumes this handle, returning ownership of its value tree.
    pub fn into_document(self) -> Document {
        self.document
    }

    /// Parses one JSON byte buffer into a value tree.
    ///
    /// Resets this handle's arena first, so values from a previous parse
    /// must not be used once this call begins (spec.md §3, "Lifetimes").
    pub fn parse(&mut self, input: &[u8]) -> JsonResult<ValueRef> {
        let result = self.parse_inner(input);
        if let Err(ref err) = result {
            log::warn!("{err}");
        }
        result
    }

    fn parse_inner(&mut self, input: &[u8]) -> JsonResult<ValueRef> {
        self.reset();
        let mut lexer = Lexer::new(input);
        let mut tokens = 0usize;

        let first = self.read_token(&mut lexer, &mut tokens)?;
        match first.kind {
            TokenKind::Char(b'[') => self.open_array(&mut lexer, &mut tokens)?,
            TokenKind::Char(b'{') => self.open_object(&mut lexer, &mut tokens)?,
            TokenKind::Char(_) => return Err(JsonError::SynExtraneous { at: first.start }),
            TokenKind::End => return Err(JsonError::SynEmptyInput),
            TokenKind::Int64(v) => return self.finish_primitive_root(Primitive::Int64(v), &mut lexer),
            TokenKind::Double(v) => return self.finish_primitive_root(Primitive::Double(v), &mut lexer),
            TokenKind::Str(span) => return self.finish_primitive_root(Primitive::Str(span), &mut lexer),
            TokenKind::Bool(v) => return self.finish_primitive_root(Primitive::Bool(v), &mut lexer),
            TokenKind::Null => return self.finish_primitive_root(Primitive::Null, &mut lexer),
        }

        while let Some(frame) = self.stack.last() {
            match frame.state {
                FrameState::Array(_) => self.step_array(&mut lexer, &mut tokens)?,
                FrameState::Object(_) => self.step_object(&mut lexer, &mut tokens)?,
            }
        }

        if !lexer.at_end() {
            return Err(JsonError::SynExtraneous { at: lexer.loc() });
        }

        // The structural root is whichever composite this parse opened
        // first (spec.md §8's concrete scenarios describe the parse result
        // this way, e.g. "Array (id 1) of [...]"). Since `reset` just
        // cleared the composite pool and the very first `open_array`/
        // `open_object` call of this parse is the one that produced it,
        // that's always pool index 0 — distinct from the reverse-nesting
        // thread head (`Document::thread_head`), which is whichever
        // composite was allocated *last* and is exposed separately for
        // innermost-first traversal (see `value.rs` module docs).
        Ok(ValueRef::Composite(0))
    }

    fn finish_primitive_root(&mut self, value: Primitive, lexer: &mut Lexer) -> JsonResult<ValueRef> {
        let node = self.document.primitives.alloc(PrimitiveNode { value, next: None });
        if lexer.at_end() {
            Ok(ValueRef::Primitive(node))
        } else {
            Err(JsonError::SynExtraneous { at: lexer.loc() })
        }
    }

    fn read_token(&mut self, lexer: &mut Lexer, tokens: &mut usize) -> JsonResult<Token> {
        *tokens += 1;
        if *tokens > self.config.max_tokens {
            return Err(JsonError::TokenLimitExceeded {
                consumed: *tokens,
                limit: self.config.max_tokens,
            });
        }
        let token = lexer.next_token(&mut self.document.bytes)?;
        log::trace!("token {:?} at ({},{})", token.kind, token.start.line, token.start.col);
        Ok(token)
    }

    fn open_array(&mut self, lexer: &mut Lexer, tokens: &mut usize) -> JsonResult<()> {
        let composite = self.open_composite(CompositeTag::Array)?;
        self.stack.push(Frame {
            composite,
            state: FrameState::Array(ArrayState::AwaitingFirst),
        });
        self.step_array(lexer, tokens)
    }

    fn open_object(&mut self, lexer: &mut Lexer, tokens: &mut usize) -> JsonResult<()> {
        let composite = self.open_composite(CompositeTag::Object)?;
        self.stack.push(Frame {
            composite,
            state: FrameState::Object(ObjectState::AwaitingFirst),
        });
        self.step_object(lexer, tokens)
    }

    fn open_composite(&mut self, tag: CompositeTag) -> JsonResult<u32> {
        self.depth.enter(self.config.max_depth)?;
        let idx = alloc_composite(&mut self.document, tag);
        log::debug!("push {:?} id={}", tag, self.document.composite_id(idx));
        Ok(idx)
    }

    fn step_array(&mut self, lexer: &mut Lexer, tokens: &mut usize) -> JsonResult<()> {
        let frame_idx = self.stack.len() - 1;

        if let FrameState::Array(ArrayState::AwaitingFirst) = self.stack[frame_idx].state {
            let composite = self.stack[frame_idx].composite;
            let tk = self.read_token(lexer, tokens)?;
            match classify_element(tk)? {
                ElementOutcome::Primitive(value) => {
                    let node = primitive_node(&mut self.document, value);
                    prepend_child(&mut self.document, composite, node);
                    self.stack[frame_idx].state = FrameState::Array(ArrayState::AwaitingMore);
                }
                ElementOutcome::OpenArray => {
                    self.stack[frame_idx].state = FrameState::Array(ArrayState::AwaitingMore);
                    return self.open_array(lexer, tokens);
                }
                ElementOutcome::OpenObject => {
                    self.stack[frame_idx].state = FrameState::Array(ArrayState::AwaitingMore);
                    return self.open_object(lexer, tokens);
                }
                ElementOutcome::Close => {
                    self.close_array(frame_idx);
                    return Ok(());
                }
            }
        }

        loop {
            let composite = self.stack[frame_idx].composite;
            let delim = self.read_token(lexer, tokens)?;
            match delim.kind {
                TokenKind::Char(b',') => {
                    let tk = self.read_token(lexer, tokens)?;
                    match classify_element(tk)? {
                        ElementOutcome::Primitive(value) => {
                            let node = primitive_node(&mut self.document, value);
                            prepend_child(&mut self.document, composite, node);
                            continue;
                        }
                        ElementOutcome::OpenArray => return self.open_array(lexer, tokens),
                        ElementOutcome::OpenObject => return self.open_object(lexer, tokens),
                        ElementOutcome::Close => return Err(JsonError::SynArray { at: tk.start }),
                    }
                }
                TokenKind::Char(b']') => {
                    self.close_array(frame_idx);
                    return Ok(());
                }
                _ => return Err(JsonError::SynArray { at: delim.start }),
            }
        }
    }

    fn close_array(&mut self, frame_idx: usize) {
        let composite = self.stack[frame_idx].composite;
        log::debug!("pop array id={}", self.document.composite_id(composite));
        self.depth.exit();
        self.stack.truncate(frame_idx);
        if let Some(top) = self.stack.last() {
            prepend_child(&mut self.document, top.composite, NodeRef::Composite(composite));
        }
    }

    fn step_object(&mut self, lexer: &mut Lexer, tokens: &mut usize) -> JsonResult<()> {
        let frame_idx = self.stack.len() - 1;

        if let FrameState::Object(ObjectState::AwaitingFirst) = self.stack[frame_idx].state {
            match self.parse_key_value(frame_idx, lexer, tokens)? {
                KeyValueOutcome::Done => {
                    self.stack[frame_idx].state = FrameState::Object(ObjectState::AwaitingMore);
                }
                KeyValueOutcome::OpenArray => {
                    self.stack[frame_idx].state = FrameState::Object(ObjectState::AwaitingMore);
                    return self.open_array(lexer, tokens);
                }
                KeyValueOutcome::OpenObject => {
                    self.stack[frame_idx].state = FrameState::Object(ObjectState::AwaitingMore);
                    return self.open_object(lexer, tokens);
                }
                KeyValueOutcome::Close => {
                    self.close_object(frame_idx);
                    return Ok(());
                }
            }
        }

        loop {
            let delim = self.read_token(lexer, tokens)?;
            match delim.kind {
                TokenKind::Char(b',') => match self.parse_key_value(frame_idx, lexer, tokens)? {
                    KeyValueOutcome::Done => continue,
                    KeyValueOutcome::OpenArray => return self.open_array(lexer, tokens),
                    KeyValueOutcome::OpenObject => return self.open_object(lexer, tokens),
                    KeyValueOutcome::Close => return Err(JsonError::SynObjectSyntax { at: delim.start }),
                },
                TokenKind::Char(b'}') => {
                    self.close_object(frame_idx);
                    return Ok(());
                }
                _ => return Err(JsonError::SynObjectSyntax { at: delim.start }),
            }
        }
    }

    fn close_object(&mut self, frame_idx: usize) {
        let composite = self.stack[frame_idx].composite;
        log::debug!("pop object id={}", self.document.composite_id(composite));
        self.depth.exit();
        self.stack.truncate(frame_idx);
        if let Some(top) = self.stack.last() {
            prepend_child(&mut self.document, top.composite, NodeRef::Composite(composite));
        }
    }

    /// Reads one `key : value` pair for the object at `frame_idx`. On entry
    /// to an empty object (`{}`) or right after a closed key/value, the key
    /// position may instead hold the closing `}`.
    fn parse_key_value(&mut self, frame_idx: usize, lexer: &mut Lexer, tokens: &mut usize) -> JsonResult<KeyValueOutcome> {
        let composite = self.stack[frame_idx].composite;

        let key = self.read_token(lexer, tokens)?;
        match key.kind {
            TokenKind::Str(span) => {
                let node = primitive_node(&mut self.document, Primitive::Str(span));
                prepend_child(&mut self.document, composite, node);
            }
            TokenKind::Char(b'}') => return Ok(KeyValueOutcome::Close),
            _ => {
                if key.kind != TokenKind::End {
                    lexer.rewind();
                }
                return Err(JsonError::SynObjectKey { at: key.start });
            }
        }

        let colon = self.read_token(lexer, tokens)?;
        if colon.kind != TokenKind::Char(b':') {
            return Err(JsonError::SynObjectColon { at: colon.start });
        }

        let value = self.read_token(lexer, tokens)?;
        match classify_element_as_value(value)? {
            ElementOutcome::Primitive(prim) => {
                let node = primitive_node(&mut self.document, prim);
                prepend_child(&mut self.document, composite, node);
                Ok(KeyValueOutcome::Done)
            }
            ElementOutcome::OpenArray => Ok(KeyValueOutcome::OpenArray),
            ElementOutcome::OpenObject => Ok(KeyValueOutcome::OpenObject),
            ElementOutcome::Close => Err(JsonError::SynObjectValue { at: value.start }),
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_element(tk: Token) -> JsonResult<ElementOutcome> {
    match primitive_from_token(tk.kind) {
        Some(value) => Ok(ElementOutcome::Primitive(value)),
        None => match tk.kind {
            TokenKind::Char(b'[') => Ok(ElementOutcome::OpenArray),
            TokenKind::Char(b'{') => Ok(ElementOutcome::OpenObject),
            TokenKind::Char(b']') => Ok(ElementOutcome::Close),
            _ => Err(JsonError::SynArray { at: tk.start }),
        },
    }
}

fn classify_element_as_value(tk: Token) -> JsonResult<ElementOutcome> {
    match primitive_from_token(tk.kind) {
        Some(value) => Ok(ElementOutcome::Primitive(value)),
        None => match tk.kind {
            TokenKind::Char(b'[') => Ok(ElementOutcome::OpenArray),
            TokenKind::Char(b'{') => Ok(ElementOutcome::OpenObject),
            _ => Err(JsonError::SynObjectValue { at: tk.start }),
        },
    }
}

fn primitive_from_token(kind: TokenKind) -> Option<Primitive> {
    match kind {
        TokenKind::Int64(v) => Some(Primitive::Int64(v)),
        TokenKind::Double(v) => Some(Primitive::Double(v)),
        TokenKind::Str(span) => Some(Primitive::Str(span)),
        TokenKind::Bool(v) => Some(Primitive::Bool(v)),
        TokenKind::Null => Some(Primitive::Null),
        TokenKind::Char(_) | TokenKind::End => None,
    }
}

fn primitive_node(doc: &mut Document, value: Primitive) -> NodeRef {
    let id = doc.primitives.alloc(PrimitiveNode { value, next: None });
    NodeRef::Primitive(id)
}

fn alloc_composite(doc: &mut Document, tag: CompositeTag) -> u32 {
    let prev_len = doc.composites.len() as u32;
    let reverse_link = if prev_len == 0 { None } else { Some(prev_len - 1) };
    doc.composites.alloc(CompositeNode {
        tag,
        id: prev_len + 1,
        child_head: None,
        child_count: 0,
        reverse_nesting_order: reverse_link,
        next: None,
    })
}

/// Prepends `child` to `composite`'s child list (§3: arrays/objects link
/// children in reverse parse order).
fn prepend_child(doc: &mut Document, composite: u32, child: NodeRef) {
    let prev_head = doc.composites.get(composite).child_head;
    match child {
        NodeRef::Primitive(id) => doc.primitives.get_mut(id).next = prev_head,
        NodeRef::Composite(id) => doc.composites.get_mut(id).next = prev_head,
    }
    let top = doc.composites.get_mut(composite);
    top.child_head = Some(child);
    top.child_count += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Tag;

    fn parse(input: &str) -> JsonResult<(Document, ValueRef)> {
        let mut parser = Parser::new();
        let value = parser.parse(input.as_bytes())?;
        // Parser is consumed here in the real API via `document()`; for
        // tests we copy out what we need by re-parsing isn't possible since
        // Document isn't Clone, so we return a fresh Parser's document by
        // taking ownership instead.
        Ok((std::mem::replace(&mut parser.document, Document::create()), value))
    }

    #[test]
    fn parses_nested_array_and_object() {
        let (doc, root) = parse(r#"[1, 2, {"key": 3.4}]"#).unwrap();
        // The structural root is the outer array, not whichever composite
        // was allocated last.
        assert_eq!(doc.tag(root), Tag::Array);
        assert_eq!(
            match root {
                ValueRef::Composite(id) => doc.composite_id(id),
                _ => panic!("expected composite"),
            },
            1
        );

        let thread = doc.reverse_nesting_order(doc.thread_head().unwrap());
        let ids: Vec<u32> = thread.map(|idx| doc.composite_id(idx)).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn array_children_in_reverse_order() {
        let (doc, root) = parse("[1, 2, 3]").unwrap();
        let id = match root {
            ValueRef::Composite(id) => id,
            _ => panic!("expected composite"),
        };
        assert_eq!(doc.child_count(id), 3);
        let values: Vec<i64> = doc
            .children(id)
            .map(|v| match v {
                ValueRef::Primitive(p) => doc.as_i64(p).unwrap(),
                _ => panic!("expected primitive"),
            })
            .collect();
        assert_eq!(values, vec![3, 2, 1]);
    }

    #[test]
    fn object_children_reversed_alternation() {
        let (doc, root) = parse(r#"{"a": 1, "b": 2}"#).unwrap();
        let id = match root {
            ValueRef::Composite(id) => id,
            _ => panic!("expected composite"),
        };
        assert_eq!(doc.child_count(id), 4);
        let keys_and_vals: Vec<String> = doc
            .children(id)
            .map(|v| match v {
                ValueRef::Primitive(p) => doc
                    .as_str(p)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| doc.as_i64(p).unwrap().to_string()),
                _ => panic!("expected primitive"),
            })
            .collect();
        assert_eq!(keys_and_vals, vec!["2", "b", "1", "a"]);
    }

    #[test]
    fn empty_array_and_object() {
        let (doc, root) = parse("[]").unwrap();
        match root {
            ValueRef::Composite(id) => assert_eq!(doc.child_count(id), 0),
            _ => panic!("expected composite"),
        }
        let (doc, root) = parse("{}").unwrap();
        match root {
            ValueRef::Composite(id) => assert_eq!(doc.child_count(id), 0),
            _ => panic!("expected composite"),
        }
    }

    #[test]
    fn lone_primitive_root() {
        let (doc, root) = parse("1").unwrap();
        match root {
            ValueRef::Primitive(id) => assert_eq!(doc.as_i64(id), Some(1)),
            _ => panic!("expected primitive"),
        }
    }

    #[test]
    fn trailing_comma_in_array_is_error() {
        let mut parser = Parser::new();
        let err = parser.parse(b"[1,]").unwrap_err();
        assert!(matches!(err, JsonError::SynArray { .. }));
    }

    #[test]
    fn trailing_comma_in_object_is_error() {
        let mut parser = Parser::new();
        let err = parser.parse(br#"{"a":1,}"#).unwrap_err();
        assert!(matches!(err, JsonError::SynObjectSyntax { .. }));
    }

    #[test]
    fn primitive_then_trailing_token_is_error() {
        let mut parser = Parser::new();
        let err = parser.parse(b"1,").unwrap_err();
        assert!(matches!(err, JsonError::SynExtraneous { .. }));
    }

    #[test]
    fn extraneous_after_composite() {
        let mut parser = Parser::new();
        let err = parser.parse(b"[1,2]abc").unwrap_err();
        assert!(matches!(err, JsonError::SynExtraneous { .. }));
    }

    #[test]
    fn empty_input_is_error() {
        let mut parser = Parser::new();
        let err = parser.parse(b"").unwrap_err();
        assert_eq!(err, JsonError::SynEmptyInput);
    }

    #[test]
    fn non_string_key_is_rejected() {
        let mut parser = Parser::new();
        let err = parser.parse(br#"{1: 2}"#).unwrap_err();
        assert!(matches!(err, JsonError::SynObjectKey { .. }));
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut parser = Parser::with_config(ParseConfig::new().with_max_depth(2));
        let err = parser.parse(b"[[[1]]]").unwrap_err();
        assert!(matches!(err, JsonError::RecursionLimitExceeded { .. }));
    }

    #[test]
    fn reset_allows_reuse_across_parses() {
        let mut parser = Parser::new();
        for _ in 0..3 {
            let value = parser.parse(r#"[1, 2, {"key": 3.4}]"#.as_bytes()).unwrap();
            assert_eq!(parser.document().tag(value), Tag::Array);
        }
    }
}
