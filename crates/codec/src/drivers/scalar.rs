//! Built-in scalar drivers and the bare `object` driver

use crate::catalog::TypeInfo;
use crate::decoder::Decoder;
use crate::driver::{Decoded, Driver, Shape, Subject};
use crate::encoder::Encoder;
use crate::error::CodecResult;
use crate::marker::Marker;
use tessera_core::{ObjectId, ScalarKind, TypeIdentity, Value};

/// Driver for one built-in scalar kind.
///
/// Kinds with their own marker are inline. The rest (`i8`, `u8`, `i16`,
/// `u16`, `i64`, `u64`) are sealed value types: framed by a `Struct` marker
/// when standalone, naked inside composites.
#[derive(Debug)]
pub struct ScalarDriver {
    kind: ScalarKind,
    identity: TypeIdentity,
}

impl ScalarDriver {
    /// Driver for `kind`
    pub fn new(kind: ScalarKind) -> Self {
        ScalarDriver {
            kind,
            identity: kind.identity(),
        }
    }

    /// Scalar kind handled
    pub fn kind(&self) -> ScalarKind {
        self.kind
    }
}

impl Driver for ScalarDriver {
    fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    fn shape(&self) -> Shape {
        if Marker::for_scalar(self.kind).is_some() {
            Shape::Inline
        } else {
            Shape::Value
        }
    }

    fn decode(
        &self,
        d: &mut Decoder<'_>,
        _info: &TypeInfo,
        _this: Option<ObjectId>,
    ) -> CodecResult<Decoded> {
        Ok(Decoded::Value(Value::Scalar(d.read_scalar(self.kind)?)))
    }

    fn encode(&self, e: &mut Encoder<'_>, subject: Subject<'_>) -> CodecResult<()> {
        match subject {
            Subject::Value(Value::Scalar(s)) if s.kind() == self.kind => {
                e.write_scalar(s);
                Ok(())
            }
            other => Err(other.mismatch(&self.identity)),
        }
    }
}

/// Driver for the bare `object` type.
///
/// Never selected from a type entry with content: `object` instances with
/// no state are written with the `EmptyObject` marker, everything else
/// carries its own runtime type.
#[derive(Debug)]
pub struct AnyDriver {
    identity: TypeIdentity,
}

impl AnyDriver {
    /// The `object` driver
    pub fn new() -> Self {
        AnyDriver {
            identity: TypeIdentity::object(),
        }
    }
}

impl Default for AnyDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for AnyDriver {
    fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    fn shape(&self) -> Shape {
        Shape::Dynamic
    }

    fn decode(
        &self,
        d: &mut Decoder<'_>,
        _info: &TypeInfo,
        _this: Option<ObjectId>,
    ) -> CodecResult<Decoded> {
        Err(d.corruption("type entry 'object' cannot carry content"))
    }

    fn encode(&self, _e: &mut Encoder<'_>, subject: Subject<'_>) -> CodecResult<()> {
        Err(subject.mismatch(&self.identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_kinds_are_inline() {
        assert_eq!(ScalarDriver::new(ScalarKind::I32).shape(), Shape::Inline);
        assert_eq!(ScalarDriver::new(ScalarKind::String).shape(), Shape::Inline);
        assert!(!ScalarDriver::new(ScalarKind::I32).is_sealed());
    }

    #[test]
    fn test_markerless_kinds_are_sealed_values() {
        for kind in [
            ScalarKind::I8,
            ScalarKind::U8,
            ScalarKind::I16,
            ScalarKind::U16,
            ScalarKind::I64,
            ScalarKind::U64,
        ] {
            let driver = ScalarDriver::new(kind);
            assert_eq!(driver.shape(), Shape::Value, "{:?}", kind);
            assert!(driver.is_sealed());
            assert_eq!(driver.identity().as_str(), kind.name());
        }
    }

    #[test]
    fn test_any_driver_is_dynamic() {
        let driver = AnyDriver::new();
        assert_eq!(driver.shape(), Shape::Dynamic);
        assert_eq!(driver.identity().as_str(), "object");
    }
}
