//! Synthesized collection drivers
//!
//! ```text
//! List / Array := count:varint element*
//! Map          := comparer:u8 count:varint (key value)*
//! Set          := comparer:u8 count:varint element*
//! ```
//!
//! All collections are pre-tracked so their elements may refer back to
//! them. Map and set entries are inserted by a deferred action once the main
//! pass is over.

use crate::catalog::TypeInfo;
use crate::debug::Crumb;
use crate::decoder::Decoder;
use crate::driver::{Decoded, Driver, Element, Registration, Shape, Subject};
use crate::encoder::Encoder;
use crate::error::{CodecError, CodecResult};
use tessera_core::{KeyComparer, MapObject, Object, ObjectId, Sequence, SetObject, TypeIdentity, Value};

fn read_items(d: &mut Decoder<'_>, element: &Element, count: usize) -> CodecResult<Vec<Value>> {
    let mut items = Vec::with_capacity(count);
    for i in 0..count {
        d.enter(Crumb::Index(i));
        items.push(d.read_element(element)?);
        d.leave();
    }
    Ok(items)
}

fn read_comparer(d: &mut Decoder<'_>, key_type: &TypeIdentity) -> CodecResult<KeyComparer> {
    let byte = d.read_u8()?;
    match KeyComparer::from_byte(byte) {
        Some(comparer) => Ok(comparer.normalize_for(key_type)),
        None => Err(d.corruption(format!("unknown key comparer byte {}", byte))),
    }
}

fn require_pending(identity: &TypeIdentity, this: Option<ObjectId>) -> CodecResult<ObjectId> {
    this.ok_or_else(|| CodecError::contract(identity, "keyed collections must be pre-tracked"))
}

/// List or fixed-length array
#[derive(Debug)]
pub struct SequenceDriver {
    identity: TypeIdentity,
    element: Element,
    array: bool,
}

impl SequenceDriver {
    /// `List<element>`
    pub fn list(identity: TypeIdentity, element: Element) -> Self {
        SequenceDriver {
            identity,
            element,
            array: false,
        }
    }

    /// `Array<element>`
    pub fn array(identity: TypeIdentity, element: Element) -> Self {
        SequenceDriver {
            identity,
            element,
            array: true,
        }
    }
}

impl Driver for SequenceDriver {
    fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    fn shape(&self) -> Shape {
        Shape::Reference(Registration::PreTrack)
    }

    fn decode(
        &self,
        d: &mut Decoder<'_>,
        _info: &TypeInfo,
        _this: Option<ObjectId>,
    ) -> CodecResult<Decoded> {
        let count = d.read_count()?;
        let items = read_items(d, &self.element, count)?;
        let sequence = Sequence::from_items(self.element.identity().clone(), items);
        Ok(Decoded::Object(if self.array {
            Object::Array(sequence)
        } else {
            Object::List(sequence)
        }))
    }

    fn encode(&self, e: &mut Encoder<'_>, subject: Subject<'_>) -> CodecResult<()> {
        let sequence = match (self.array, subject) {
            (false, Subject::Object(_, Object::List(s))) => s,
            (true, Subject::Object(_, Object::Array(s))) => s,
            (_, other) => return Err(other.mismatch(&self.identity)),
        };
        e.write_count(sequence.items.len());
        for item in &sequence.items {
            e.write_element(&self.element, item)?;
        }
        Ok(())
    }
}

/// `Map<key,value>`
#[derive(Debug)]
pub struct MapDriver {
    identity: TypeIdentity,
    key: Element,
    value: Element,
}

impl MapDriver {
    /// Driver over the given key and value constituents
    pub fn new(identity: TypeIdentity, key: Element, value: Element) -> Self {
        MapDriver {
            identity,
            key,
            value,
        }
    }
}

impl Driver for MapDriver {
    fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    fn shape(&self) -> Shape {
        Shape::Reference(Registration::PreTrack)
    }

    fn decode(
        &self,
        d: &mut Decoder<'_>,
        _info: &TypeInfo,
        this: Option<ObjectId>,
    ) -> CodecResult<Decoded> {
        let id = require_pending(&self.identity, this)?;
        let key_type = self.key.identity().clone();
        let comparer = read_comparer(d, &key_type)?;
        let count = d.read_count()?;

        let mut pairs = Vec::with_capacity(count);
        for i in 0..count {
            d.enter(Crumb::Index(i));
            let key = d.read_element(&self.key)?;
            let value = d.read_element(&self.value)?;
            d.leave();
            pairs.push((key, value));
        }

        d.defer(move |graph| {
            let map = graph.map_mut(id)?;
            for (key, value) in pairs {
                if map.insert(key, value).is_some() {
                    return Err(CodecError::detached(format!(
                        "duplicate key in map {} under {:?} comparer",
                        id,
                        map.comparer()
                    )));
                }
            }
            Ok(())
        });

        Ok(Decoded::Object(Object::Map(MapObject::new(
            key_type,
            self.value.identity().clone(),
            comparer,
        ))))
    }

    fn encode(&self, e: &mut Encoder<'_>, subject: Subject<'_>) -> CodecResult<()> {
        let Subject::Object(_, Object::Map(map)) = subject else {
            return Err(subject.mismatch(&self.identity));
        };
        e.write_u8(map.comparer().to_byte());
        e.write_count(map.len());
        for (key, value) in map.iter() {
            e.write_element(&self.key, key)?;
            e.write_element(&self.value, value)?;
        }
        Ok(())
    }
}

/// `Set<element>`
#[derive(Debug)]
pub struct SetDriver {
    identity: TypeIdentity,
    element: Element,
}

impl SetDriver {
    /// Driver over the given element constituent
    pub fn new(identity: TypeIdentity, element: Element) -> Self {
        SetDriver { identity, element }
    }
}

impl Driver for SetDriver {
    fn identity(&self) -> &TypeIdentity {
        &self.identity
    }

    fn shape(&self) -> Shape {
        Shape::Reference(Registration::PreTrack)
    }

    fn decode(
        &self,
        d: &mut Decoder<'_>,
        _info: &TypeInfo,
        this: Option<ObjectId>,
    ) -> CodecResult<Decoded> {
        let id = require_pending(&self.identity, this)?;
        let element_type = self.element.identity().clone();
        let comparer = read_comparer(d, &element_type)?;
        let count = d.read_count()?;
        let items = read_items(d, &self.element, count)?;

        d.defer(move |graph| {
            let set = graph.set_mut(id)?;
            for item in items {
                if !set.insert(item) {
                    return Err(CodecError::detached(format!(
                        "duplicate member in set {}",
                        id
                    )));
                }
            }
            Ok(())
        });

        Ok(Decoded::Object(Object::Set(SetObject::new(
            element_type,
            comparer,
        ))))
    }

    fn encode(&self, e: &mut Encoder<'_>, subject: Subject<'_>) -> CodecResult<()> {
        let Subject::Object(_, Object::Set(set)) = subject else {
            return Err(subject.mismatch(&self.identity));
        };
        e.write_u8(set.comparer().to_byte());
        e.write_count(set.len());
        for item in set.iter() {
            e.write_element(&self.element, item)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::ScalarDriver;
    use std::sync::Arc;
    use tessera_core::ScalarKind;

    fn element(kind: ScalarKind) -> Element {
        Element::new(Arc::new(ScalarDriver::new(kind)))
    }

    #[test]
    fn test_collections_are_pre_tracked() {
        let list = SequenceDriver::list(TypeIdentity::new("List<i32>"), element(ScalarKind::I32));
        let set = SetDriver::new(TypeIdentity::new("Set<string>"), element(ScalarKind::String));
        assert_eq!(list.shape(), Shape::Reference(Registration::PreTrack));
        assert_eq!(set.shape(), Shape::Reference(Registration::PreTrack));
        assert!(!list.is_sealed());
    }

    #[test]
    fn test_keyed_collections_require_pending_identity() {
        let err = require_pending(&TypeIdentity::new("Map<string,i32>"), None).unwrap_err();
        assert!(matches!(err, CodecError::DriverContract { .. }));
    }

    #[test]
    fn test_sealed_elements_detected() {
        assert!(element(ScalarKind::I64).sealed);
        assert!(!element(ScalarKind::I32).sealed);
    }
}
