#![deny(unsafe_code, clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::todo, clippy::unimplemented, clippy::dbg_macro)]

//! A single-pass, arena-allocated JSON parser.
//!
//! Parsing never recurses on the host call stack — composite nesting is
//! driven by an explicit stack inside [`Parser`], bounded by
//! [`ParseConfig::max_depth`] — and every node it produces lives in one of
//! two index-addressed arenas owned by a [`Document`], so a whole parse
//! tree is freed in one step and can be reused across many parses via
//! [`Parser::reset`].
//!
//! ```
//! use jparse::parse;
//!
//! let (doc, root) = parse(br#"{"answer": 42}"#).unwrap();
//! assert_eq!(doc.tag(root), jparse::Tag::Object);
//! ```

pub mod arena;
pub mod config;
pub mod error;
pub mod lexer;
pub mod numeric;
pub mod parser;
pub mod value;

pub use config::{DepthGuard, ParseConfig};
pub use error::{JsonError, JsonResult, Location};
pub use parser::Parser;
pub use value::{Document, Tag, ValueRef};

/// Parses one JSON byte buffer with default resource limits.
///
/// A convenience for one-shot callers who don't need to reuse a [`Parser`]
/// handle across multiple inputs: builds a fresh `Parser`, parses `input`,
/// and hands back the resulting [`Document`] together with a [`ValueRef`]
/// to its root.
pub fn parse(input: &[u8]) -> JsonResult<(Document, ValueRef)> {
    let mut parser = Parser::new();
    let root = parser.parse(input)?;
    Ok((parser.into_document(), root))
}
