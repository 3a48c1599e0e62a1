//! JSON rendering of export tokens
//!
//! # Grammar
//!
//! ```text
//! object     {"$id":3,"$type":"demo.Person","Name":"A"}   value structs omit "$id"
//! list       ["$list",3,e1,e2]                            handle is null for synthetic lists
//! map        ["$map",4,[k,v],[k,v]]
//! set        ["$set",5,m1,m2]
//! reference  {"$ref":3}
//! empty      {"$empty":6}
//! ```
//!
//! Scalars become JSON numbers, booleans and strings. Chars, guids,
//! RFC 3339 date-times and ISO 8601 durations are strings, non-finite
//! floats are `"NaN"`, `"Infinity"` and `"-Infinity"`.

use crate::sink::{ExportSink, ObjectExportedKind};
use chrono::SecondsFormat;
use std::fmt::Write as _;
use tessera_core::Scalar;

#[derive(Debug)]
struct Frame {
    kind: ObjectExportedKind,
    /// Something was already written inside the brackets
    has_content: bool,
    /// Values written so far (map entries count key and value separately)
    values: usize,
}

/// Sink that renders the JSON export grammar into a string
#[derive(Debug, Default)]
pub struct JsonSink {
    out: String,
    frames: Vec<Frame>,
    /// A property name was written and its value is next
    after_property: bool,
}

impl JsonSink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Text rendered so far
    pub fn as_str(&self) -> &str {
        &self.out
    }

    /// Take the rendered text
    pub fn into_string(self) -> String {
        self.out
    }

    fn comma_if_needed(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.has_content {
                self.out.push(',');
            }
            frame.has_content = true;
        }
    }

    fn before_value(&mut self) {
        if self.after_property {
            self.after_property = false;
            return;
        }
        let opens_entry = matches!(
            self.frames.last(),
            Some(f) if f.kind == ObjectExportedKind::Map && f.values % 2 == 0
        );
        self.comma_if_needed();
        if opens_entry {
            self.out.push('[');
        }
    }

    fn after_value(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.kind == ObjectExportedKind::Object {
                return;
            }
            frame.values += 1;
            if frame.kind == ObjectExportedKind::Map && frame.values % 2 == 0 {
                self.out.push(']');
            }
        }
    }

    fn write_str(&mut self, s: &str) {
        // Serializing a &str cannot fail
        match serde_json::to_string(s) {
            Ok(quoted) => self.out.push_str(&quoted),
            Err(_) => self.out.push_str("\"\""),
        }
    }

    fn write_float(&mut self, v: f64, text: impl FnOnce() -> String) {
        if v.is_nan() {
            self.out.push_str("\"NaN\"");
        } else if v == f64::INFINITY {
            self.out.push_str("\"Infinity\"");
        } else if v == f64::NEG_INFINITY {
            self.out.push_str("\"-Infinity\"");
        } else {
            self.out.push_str(&text());
        }
    }

    fn write_scalar(&mut self, value: &Scalar) {
        match value {
            Scalar::Bool(v) => self.out.push_str(if *v { "true" } else { "false" }),
            Scalar::Char(c) => self.write_str(c.encode_utf8(&mut [0u8; 4])),
            Scalar::I8(v) => self.push_display(v),
            Scalar::U8(v) => self.push_display(v),
            Scalar::I16(v) => self.push_display(v),
            Scalar::U16(v) => self.push_display(v),
            Scalar::I32(v) => self.push_display(v),
            Scalar::U32(v) => self.push_display(v),
            Scalar::I64(v) => self.push_display(v),
            Scalar::U64(v) => self.push_display(v),
            Scalar::F32(v) => {
                let v = *v;
                self.write_float(f64::from(v), || serde_json::to_string(&v).unwrap_or_default())
            }
            Scalar::F64(v) => {
                let v = *v;
                self.write_float(v, || serde_json::to_string(&v).unwrap_or_default())
            }
            Scalar::String(s) => self.write_str(s),
            Scalar::Guid(g) => self.write_str(&g.hyphenated().to_string()),
            Scalar::DateTime(dt) => {
                self.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Scalar::TimeSpan(d) => self.write_str(&d.to_string()),
            Scalar::DateTimeOffset(dt) => {
                self.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, false))
            }
        }
    }

    fn push_display(&mut self, v: impl std::fmt::Display) {
        let _ = write!(self.out, "{}", v);
    }
}

impl ExportSink for JsonSink {
    fn begin_object(&mut self, kind: ObjectExportedKind, handle: Option<u32>, type_name: Option<&str>) {
        self.before_value();
        let mut has_content = false;
        match kind.discriminator() {
            None => {
                self.out.push('{');
                if let Some(handle) = handle {
                    let _ = write!(self.out, "\"$id\":{}", handle);
                    has_content = true;
                }
                if let Some(name) = type_name {
                    if has_content {
                        self.out.push(',');
                    }
                    self.out.push_str("\"$type\":");
                    self.write_str(name);
                    has_content = true;
                }
            }
            Some(tag) => {
                self.out.push('[');
                self.write_str(tag);
                match handle {
                    Some(handle) => {
                        let _ = write!(self.out, ",{}", handle);
                    }
                    None => self.out.push_str(",null"),
                }
                has_content = true;
            }
        }
        self.frames.push(Frame {
            kind,
            has_content,
            values: 0,
        });
    }

    fn end_object(&mut self, kind: ObjectExportedKind) {
        self.frames.pop();
        self.out.push(match kind {
            ObjectExportedKind::Object => '}',
            _ => ']',
        });
        self.after_value();
    }

    fn property(&mut self, name: &str) {
        self.comma_if_needed();
        self.write_str(name);
        self.out.push(':');
        self.after_property = true;
    }

    fn null(&mut self) {
        self.before_value();
        self.out.push_str("null");
        self.after_value();
    }

    fn scalar(&mut self, value: &Scalar) {
        self.before_value();
        self.write_scalar(value);
        self.after_value();
    }

    fn reference(&mut self, handle: u32) {
        self.before_value();
        let _ = write!(self.out, "{{\"$ref\":{}}}", handle);
        self.after_value();
    }

    fn empty_object(&mut self, handle: u32) {
        self.before_value();
        let _ = write!(self.out, "{{\"$empty\":{}}}", handle);
        self.after_value();
    }
}
