//! Enum driver
//!
//! Enums are sealed value types. Standalone they are framed by a `Struct`
//! marker and an externally versioned type entry; inside composites the
//! underlying integer is written naked.

use crate::catalog::TypeInfo;
use crate::decoder::Decoder;
use crate::driver::{Decoded, Driver, Shape, Subject};
use crate::encoder::Encoder;
use crate::error::{CodecError, CodecResult};
use tessera_core::{EnumValue, ObjectId, ScalarKind, TypeIdentity, Value};

/// Driver for one declared enum type
#[derive(Debug)]
pub struct EnumDriver {
    identity: TypeIdentity,
    underlying: ScalarKind,
}

impl EnumDriver {
    /// Driver for `identity` stored as `underlying`; the kind must be
    /// integral
    pub fn new(identity: TypeIdentity, underlying: ScalarKind) -> CodecResult<Self> {
        if !underlying.is_integral() {
            return Err(CodecError::resolution(
                &identity,
                format!("enum underlying type '{}' is not integral", underlying.name()),
            ));
        }
        Ok(EnumDriver {
            identity,
            underlying,
        })
    }

    /// Underlying integral kind
    pub fn underlying(&self) -> ScalarKind {
        self.underlying
    }
}

impl Driver for EnumDriver {
    fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    fn shape(&self) -> Shape {
        Shape::Value
    }

    fn decode(
        &self,
        d: &mut Decoder<'_>,
        _info: &TypeInfo,
        _this: Option<ObjectId>,
    ) -> CodecResult<Decoded> {
        let raw = d.read_scalar(self.underlying)?;
        let Some(value) = raw.integral_as_i64() else {
            return Err(d.corruption(format!("enum '{}' read a non-integral value", self.identity)));
        };
        Ok(Decoded::Value(Value::Enum(EnumValue::new(
            self.identity.clone(),
            value,
        ))))
    }

    fn encode(&self, e: &mut Encoder<'_>, subject: Subject<'_>) -> CodecResult<()> {
        let Subject::Value(Value::Enum(member)) = subject else {
            return Err(subject.mismatch(&self.identity));
        };
        if !member.type_id.weakly_matches(&self.identity) {
            return Err(subject.mismatch(&self.identity));
        }
        let scalar = self
            .underlying
            .integral_from_i64(member.value)
            .ok_or_else(|| {
                CodecError::encode(format!(
                    "value {} of enum '{}' does not fit {}",
                    member.value,
                    self.identity,
                    self.underlying.name()
                ))
            })?;
        e.write_scalar(&scalar);
        Ok(())
    }
}
