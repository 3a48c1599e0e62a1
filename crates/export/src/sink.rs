//! Structural token sinks
//!
//! The exporter walks a graph and reports what it sees as a flat stream of
//! tokens. A sink decides what to do with them: [`JsonSink`](crate::JsonSink)
//! renders text, [`TokenRecorder`] keeps them for inspection.
//!
//! Map entries are reported as alternating key and value tokens between the
//! map's begin and end tokens.

use tessera_core::Scalar;

/// Structural shape of an exported container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectExportedKind {
    /// Named properties (records and value structs)
    Object,
    /// Ordered items (lists and arrays)
    List,
    /// Key/value entries
    Map,
    /// Members
    Set,
}

impl ObjectExportedKind {
    /// Discriminator used by the JSON grammar; `None` for plain objects
    pub fn discriminator(self) -> Option<&'static str> {
        match self {
            ObjectExportedKind::Object => None,
            ObjectExportedKind::List => Some("$list"),
            ObjectExportedKind::Map => Some("$map"),
            ObjectExportedKind::Set => Some("$set"),
        }
    }
}

/// Receiver of export tokens
///
/// `handle` is the object's position in the export's own reference table.
/// It is `None` for value structs and synthetic sequences, which can never
/// be referenced back.
pub trait ExportSink {
    /// A container starts
    fn begin_object(&mut self, kind: ObjectExportedKind, handle: Option<u32>, type_name: Option<&str>);

    /// The innermost open container ends
    fn end_object(&mut self, kind: ObjectExportedKind);

    /// Name of the next property of the current object
    fn property(&mut self, name: &str);

    /// Null value
    fn null(&mut self);

    /// Primitive value
    fn scalar(&mut self, value: &Scalar);

    /// An already exported object seen again
    fn reference(&mut self, handle: u32);

    /// Bare `object` instance with no state
    fn empty_object(&mut self, handle: u32);
}

/// One recorded token
#[derive(Debug, Clone, PartialEq)]
pub enum ExportToken {
    /// Container start
    Begin {
        /// Shape
        kind: ObjectExportedKind,
        /// Export handle, if referenceable
        handle: Option<u32>,
        /// Type name for objects
        type_name: Option<String>,
    },
    /// Container end
    End(ObjectExportedKind),
    /// Property name
    Property(String),
    /// Null
    Null,
    /// Primitive
    Scalar(Scalar),
    /// Back-reference
    Reference(u32),
    /// Bare object
    EmptyObject(u32),
}

/// Sink that keeps every token in order
#[derive(Debug, Default, Clone)]
pub struct TokenRecorder {
    tokens: Vec<ExportToken>,
}

impl TokenRecorder {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens seen so far
    pub fn tokens(&self) -> &[ExportToken] {
        &self.tokens
    }

    /// Take the recorded tokens
    pub fn into_tokens(self) -> Vec<ExportToken> {
        self.tokens
    }

    /// Number of back-reference tokens recorded
    pub fn reference_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|t| matches!(t, ExportToken::Reference(_)))
            .count()
    }
}

impl ExportSink for TokenRecorder {
    fn begin_object(&mut self, kind: ObjectExportedKind, handle: Option<u32>, type_name: Option<&str>) {
        self.tokens.push(ExportToken::Begin {
            kind,
            handle,
            type_name: type_name.map(str::to_owned),
        });
    }

    fn end_object(&mut self, kind: ObjectExportedKind) {
        self.tokens.push(ExportToken::End(kind));
    }

    fn property(&mut self, name: &str) {
        self.tokens.push(ExportToken::Property(name.to_owned()));
    }

    fn null(&mut self) {
        self.tokens.push(ExportToken::Null);
    }

    fn scalar(&mut self, value: &Scalar) {
        self.tokens.push(ExportToken::Scalar(value.clone()));
    }

    fn reference(&mut self, handle: u32) {
        self.tokens.push(ExportToken::Reference(handle));
    }

    fn empty_object(&mut self, handle: u32) {
        self.tokens.push(ExportToken::EmptyObject(handle));
    }
}
