//! Type identities
//!
//! A [`TypeIdentity`] is the stable string that names a type on the wire.
//! Identities are cheap to clone (`Arc<str>`) and are compared by their exact
//! text; the *weak* form strips build qualifiers so that the same logical type
//! written by a slightly different build resolves to the same driver.
//!
//! ## Grammar
//!
//! ```text
//! identity  := name [ '|' qualifier ] [ '<' identity ( ',' identity )* '>' ]
//! qualifier := any text without '<' '>' ',' '|'
//! ```
//!
//! Examples: `demo.Person|demo-model@1.2.0`, `List<demo.Person>`,
//! `Map<string,List<i32>>`.

use crate::limits::MAX_GENERIC_DEPTH;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Built-in identity names for scalar kinds and the bare `object` type.
pub mod builtin {
    /// Boolean
    pub const BOOL: &str = "bool";
    /// Unicode scalar value
    pub const CHAR: &str = "char";
    /// Signed 8-bit integer
    pub const I8: &str = "i8";
    /// Unsigned 8-bit integer
    pub const U8: &str = "u8";
    /// Signed 16-bit integer
    pub const I16: &str = "i16";
    /// Unsigned 16-bit integer
    pub const U16: &str = "u16";
    /// Signed 32-bit integer
    pub const I32: &str = "i32";
    /// Unsigned 32-bit integer
    pub const U32: &str = "u32";
    /// Signed 64-bit integer
    pub const I64: &str = "i64";
    /// Unsigned 64-bit integer
    pub const U64: &str = "u64";
    /// 32-bit float
    pub const F32: &str = "f32";
    /// 64-bit float
    pub const F64: &str = "f64";
    /// UTF-8 string
    pub const STRING: &str = "string";
    /// 128-bit GUID
    pub const GUID: &str = "guid";
    /// UTC date-time
    pub const DATETIME: &str = "datetime";
    /// Signed duration
    pub const TIMESPAN: &str = "timespan";
    /// Date-time with a fixed UTC offset
    pub const DATETIMEOFFSET: &str = "datetimeoffset";
    /// The bare object type
    pub const OBJECT: &str = "object";

    /// Composite name for fixed arrays
    pub const ARRAY: &str = "Array";
    /// Composite name for growable lists
    pub const LIST: &str = "List";
    /// Composite name for hash sets
    pub const SET: &str = "Set";
    /// Composite name for dictionaries
    pub const MAP: &str = "Map";
}

/// Identity parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The identity text does not follow the grammar
    #[error("Malformed type identity '{text}' at byte {position}: {detail}")]
    Malformed {
        /// Full identity text
        text: String,
        /// Byte position of the problem
        position: usize,
        /// What was wrong
        detail: &'static str,
    },
}

/// Stable wire name of a type
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIdentity(Arc<str>);

impl TypeIdentity {
    /// Wrap an identity string without validating it
    pub fn new(text: impl AsRef<str>) -> Self {
        TypeIdentity(Arc::from(text.as_ref()))
    }

    /// Identity of the empty string (written with the empty-string sentinel)
    pub fn empty() -> Self {
        TypeIdentity::new("")
    }

    /// Build `Name<args...>`
    pub fn generic(name: &str, args: &[&TypeIdentity]) -> Self {
        let mut text = String::with_capacity(name.len() + 16);
        text.push_str(name);
        text.push('<');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                text.push(',');
            }
            text.push_str(arg.as_str());
        }
        text.push('>');
        TypeIdentity::new(text)
    }

    /// `Array<element>`
    pub fn array_of(element: &TypeIdentity) -> Self {
        Self::generic(builtin::ARRAY, &[element])
    }

    /// `List<element>`
    pub fn list_of(element: &TypeIdentity) -> Self {
        Self::generic(builtin::LIST, &[element])
    }

    /// `Set<element>`
    pub fn set_of(element: &TypeIdentity) -> Self {
        Self::generic(builtin::SET, &[element])
    }

    /// `Map<key,value>`
    pub fn map_of(key: &TypeIdentity, value: &TypeIdentity) -> Self {
        Self::generic(builtin::MAP, &[key, value])
    }

    /// The bare `object` identity
    pub fn object() -> Self {
        TypeIdentity::new(builtin::OBJECT)
    }

    /// Raw identity text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty identity
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Weak (qualifier-free) form used for cross-build matching.
    ///
    /// Malformed identities weaken to themselves minus whitespace; the
    /// registry reports them when it tries to synthesize a driver.
    pub fn weak(&self) -> TypeIdentity {
        if !self.0.contains('|') && !self.0.contains(char::is_whitespace) {
            return self.clone();
        }
        match self.parse() {
            Ok(name) => TypeIdentity::new(name.weak_text()),
            Err(_) => TypeIdentity::new(
                self.0
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>(),
            ),
        }
    }

    /// True if both identities share a weak form
    pub fn weakly_matches(&self, other: &TypeIdentity) -> bool {
        self == other || self.weak() == other.weak()
    }

    /// Parse into a structured name
    pub fn parse(&self) -> Result<TypeName, IdentityError> {
        let mut parser = Parser {
            text: &self.0,
            pos: 0,
            depth: 0,
        };
        let name = parser.parse_name()?;
        parser.skip_ws();
        if parser.pos != parser.text.len() {
            return Err(parser.error("trailing characters"));
        }
        Ok(name)
    }
}

impl fmt::Debug for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeIdentity({:?})", &*self.0)
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeIdentity {
    fn from(text: &str) -> Self {
        TypeIdentity::new(text)
    }
}

impl From<String> for TypeIdentity {
    fn from(text: String) -> Self {
        TypeIdentity::new(text)
    }
}

/// Structured form of a [`TypeIdentity`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    /// Logical name (`demo.Person`, `List`, `i32`)
    pub name: String,
    /// Build qualifier after `|`, if any
    pub qualifier: Option<String>,
    /// Generic arguments
    pub args: Vec<TypeName>,
}

impl TypeName {
    /// Render without qualifiers
    pub fn weak_text(&self) -> String {
        let mut out = String::new();
        self.write_weak(&mut out);
        out
    }

    fn write_weak(&self, out: &mut String) {
        out.push_str(&self.name);
        if !self.args.is_empty() {
            out.push('<');
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                arg.write_weak(out);
            }
            out.push('>');
        }
    }

    /// Render with qualifiers
    pub fn full_text(&self) -> String {
        let mut out = self.name.clone();
        if let Some(q) = &self.qualifier {
            out.push('|');
            out.push_str(q);
        }
        if !self.args.is_empty() {
            out.push('<');
            let args: Vec<String> = self.args.iter().map(TypeName::full_text).collect();
            out.push_str(&args.join(","));
            out.push('>');
        }
        out
    }

    /// Identity of this name, qualifiers included
    pub fn identity(&self) -> TypeIdentity {
        TypeIdentity::new(self.full_text())
    }
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, detail: &'static str) -> IdentityError {
        IdentityError::Malformed {
            text: self.text.to_string(),
            position: self.pos,
            detail,
        }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn take_until_delim(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '<' | '>' | ',' | '|') {
                break;
            }
            self.pos += c.len_utf8();
        }
        self.text[start..self.pos].trim()
    }

    fn parse_name(&mut self) -> Result<TypeName, IdentityError> {
        self.skip_ws();
        let name = self.take_until_delim();
        if name.is_empty() {
            return Err(self.error("expected a type name"));
        }
        let name = name.to_string();

        let qualifier = if self.peek() == Some('|') {
            self.pos += 1;
            let q = self.take_until_delim();
            if self.peek() == Some('|') {
                return Err(self.error("qualifier may not contain '|'"));
            }
            Some(q.to_string())
        } else {
            None
        };

        let mut args = Vec::new();
        if self.peek() == Some('<') {
            if self.depth >= MAX_GENERIC_DEPTH {
                return Err(self.error("generic arguments nested too deeply"));
            }
            self.pos += 1;
            self.depth += 1;
            loop {
                args.push(self.parse_name()?);
                self.skip_ws();
                match self.peek() {
                    Some(',') => self.pos += 1,
                    Some('>') => {
                        self.pos += 1;
                        self.depth -= 1;
                        break;
                    }
                    _ => return Err(self.error("expected ',' or '>'")),
                }
            }
        }

        Ok(TypeName {
            name,
            qualifier,
            args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weak_strips_qualifiers() {
        let id = TypeIdentity::new("demo.Person|demo-model@1.2.0");
        assert_eq!(id.weak().as_str(), "demo.Person");
    }

    #[test]
    fn test_weak_strips_nested_qualifiers() {
        let id = TypeIdentity::new("Map<string, List<demo.Person|m@2>>");
        assert_eq!(id.weak().as_str(), "Map<string,List<demo.Person>>");
    }

    #[test]
    fn test_weak_of_plain_identity_is_identity() {
        let id = TypeIdentity::new("List<i32>");
        assert_eq!(id.weak(), id);
    }

    #[test]
    fn test_weakly_matches_across_builds() {
        let a = TypeIdentity::new("demo.Person|m@1");
        let b = TypeIdentity::new("demo.Person|m@2");
        assert!(a.weakly_matches(&b));
        assert!(!a.weakly_matches(&TypeIdentity::new("demo.Pet")));
    }

    #[test]
    fn test_generic_constructors() {
        let person = TypeIdentity::new("demo.Person");
        assert_eq!(TypeIdentity::list_of(&person).as_str(), "List<demo.Person>");
        assert_eq!(TypeIdentity::array_of(&person).as_str(), "Array<demo.Person>");
        assert_eq!(TypeIdentity::set_of(&person).as_str(), "Set<demo.Person>");
        let key = TypeIdentity::new(builtin::STRING);
        assert_eq!(
            TypeIdentity::map_of(&key, &person).as_str(),
            "Map<string,demo.Person>"
        );
    }

    #[test]
    fn test_parse_structure() {
        let parsed = TypeIdentity::new("Map<string,List<demo.Person|q>>")
            .parse()
            .unwrap();
        assert_eq!(parsed.name, "Map");
        assert_eq!(parsed.args.len(), 2);
        assert_eq!(parsed.args[1].name, "List");
        assert_eq!(parsed.args[1].args[0].qualifier.as_deref(), Some("q"));
        assert_eq!(parsed.full_text(), "Map<string,List<demo.Person|q>>");
    }

    #[test]
    fn test_parse_rejects_unbalanced() {
        assert!(TypeIdentity::new("List<i32").parse().is_err());
        assert!(TypeIdentity::new("List<>").parse().is_err());
        assert!(TypeIdentity::new("List<i32>>").parse().is_err());
        assert!(TypeIdentity::new("").parse().is_err());
    }

    #[test]
    fn test_parse_rejects_runaway_nesting() {
        let nested = |depth: usize| {
            format!("{}i32{}", "List<".repeat(depth), ">".repeat(depth))
        };
        assert!(TypeIdentity::new(nested(MAX_GENERIC_DEPTH)).parse().is_ok());

        let err = TypeIdentity::new(nested(100_000)).parse().unwrap_err();
        assert!(err.to_string().contains("nested too deeply"));
    }

    #[test]
    fn test_malformed_error_mentions_text() {
        let err = TypeIdentity::new("a|b|c").parse().unwrap_err();
        assert!(err.to_string().contains("a|b|c"));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn simple_name() -> impl Strategy<Value = String> {
            "[a-z][a-z0-9_.]{0,12}"
        }

        proptest! {
            #[test]
            fn weak_ignores_any_qualifier(name in simple_name(), q in "[a-z0-9@.\\-]{1,10}") {
                let plain = TypeIdentity::new(&name);
                let qualified = TypeIdentity::new(format!("{}|{}", name, q));
                prop_assert_eq!(qualified.weak(), plain.weak());
            }

            #[test]
            fn weak_is_idempotent(name in simple_name(), q in "[a-z0-9]{1,6}") {
                let id = TypeIdentity::new(format!("List<{}|{}>", name, q));
                let once = id.weak();
                prop_assert_eq!(once.weak(), once.clone());
                prop_assert_eq!(once.as_str(), format!("List<{}>", name));
            }
        }
    }
}
