//! Structural comparison of two graphs
//!
//! Two rooted graphs are equivalent when there is a one-to-one mapping
//! between their reachable objects that preserves kinds, types, field values
//! and edges. Because the mapping must be a bijection, sharing and cycles
//! are compared too: two fields pointing at one object on the left must point
//! at one object on the right.

use super::{Graph, Object, ObjectId};
use crate::scalar::Scalar;
use crate::value::Value;
use rustc_hash::FxHashMap;

/// True if the graphs reachable from `left` and `right` are isomorphic
pub fn graphs_equivalent(a: &Graph, left: &Value, b: &Graph, right: &Value) -> bool {
    let mut cmp = Comparison {
        a,
        b,
        forward: FxHashMap::default(),
        backward: FxHashMap::default(),
        work: Vec::new(),
    };
    if !cmp.values(left, right) {
        return false;
    }
    while let Some((x, y)) = cmp.work.pop() {
        if !cmp.objects(x, y) {
            return false;
        }
    }
    true
}

struct Comparison<'g> {
    a: &'g Graph,
    b: &'g Graph,
    forward: FxHashMap<ObjectId, ObjectId>,
    backward: FxHashMap<ObjectId, ObjectId>,
    work: Vec<(ObjectId, ObjectId)>,
}

impl<'g> Comparison<'g> {
    fn values(&mut self, x: &Value, y: &Value) -> bool {
        match (x, y) {
            (Value::Null, Value::Null) => true,
            (Value::Scalar(p), Value::Scalar(q)) => scalars_identical(p, q),
            (Value::Enum(p), Value::Enum(q)) => p == q,
            (Value::Struct(p), Value::Struct(q)) => {
                p.type_id == q.type_id
                    && p.fields.len() == q.fields.len()
                    && p
                        .fields
                        .iter()
                        .zip(&q.fields)
                        .all(|((pn, pv), (qn, qv))| pn == qn && self.values(pv, qv))
            }
            (Value::Ref(p), Value::Ref(q)) => self.link(*p, *q),
            _ => false,
        }
    }

    fn link(&mut self, x: ObjectId, y: ObjectId) -> bool {
        match (self.forward.get(&x), self.backward.get(&y)) {
            (Some(&fy), Some(&bx)) => fy == y && bx == x,
            (None, None) => {
                self.forward.insert(x, y);
                self.backward.insert(y, x);
                self.work.push((x, y));
                true
            }
            _ => false,
        }
    }

    fn all(&mut self, xs: impl Iterator<Item = &'g Value>, ys: impl Iterator<Item = &'g Value>) -> bool {
        let xs: Vec<&Value> = xs.collect();
        let ys: Vec<&Value> = ys.collect();
        xs.len() == ys.len() && xs.iter().zip(&ys).all(|(x, y)| self.values(x, y))
    }

    fn objects(&mut self, x: ObjectId, y: ObjectId) -> bool {
        let (a, b) = (self.a, self.b);
        let (Ok(ox), Ok(oy)) = (a.get(x), b.get(y)) else {
            return false;
        };
        match (ox, oy) {
            (Object::Empty, Object::Empty) => true,
            (Object::Record(p), Object::Record(q)) => {
                p.type_id == q.type_id
                    && p.fields.len() == q.fields.len()
                    && p.fields.iter().map(|(n, _)| n).eq(q.fields.iter().map(|(n, _)| n))
                    && self.all(
                        p.fields.iter().map(|(_, v)| v),
                        q.fields.iter().map(|(_, v)| v),
                    )
            }
            (Object::List(p), Object::List(q)) | (Object::Array(p), Object::Array(q)) => {
                p.element == q.element && self.all(p.items.iter(), q.items.iter())
            }
            (Object::Map(p), Object::Map(q)) => {
                p.key_type() == q.key_type()
                    && p.value_type() == q.value_type()
                    && p.comparer() == q.comparer()
                    && p.len() == q.len()
                    && self.all(p.iter().map(|(k, _)| k), q.iter().map(|(k, _)| k))
                    && self.all(p.iter().map(|(_, v)| v), q.iter().map(|(_, v)| v))
            }
            (Object::Set(p), Object::Set(q)) => {
                p.element_type() == q.element_type()
                    && p.comparer() == q.comparer()
                    && self.all(p.iter(), q.iter())
            }
            _ => false,
        }
    }
}

fn scalars_identical(p: &Scalar, q: &Scalar) -> bool {
    match (p, q) {
        (Scalar::F32(a), Scalar::F32(b)) => a.to_bits() == b.to_bits(),
        (Scalar::F64(a), Scalar::F64(b)) => a.to_bits() == b.to_bits(),
        _ => p == q,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Record, Sequence};
    use crate::identity::TypeIdentity;

    fn person(name: &str, friend: Value) -> Object {
        Object::Record(
            Record::new("demo.Person")
                .with("Name", Value::string(name))
                .with("Friend", friend),
        )
    }

    #[test]
    fn test_equal_graphs_in_different_arenas() {
        let mut a = Graph::new();
        let a0 = a.insert(person("A", Value::Null));

        let mut b = Graph::new();
        b.insert(Object::Empty);
        let b1 = b.insert(person("A", Value::Null));

        assert!(graphs_equivalent(&a, &Value::Ref(a0), &b, &Value::Ref(b1)));
    }

    #[test]
    fn test_sharing_must_match() {
        let elem = TypeIdentity::new("demo.Person");

        let mut shared = Graph::new();
        let x = shared.insert(person("X", Value::Null));
        let list = shared.insert(Object::List(Sequence::from_items(
            elem.clone(),
            vec![Value::Ref(x), Value::Ref(x)],
        )));

        let mut copied = Graph::new();
        let x1 = copied.insert(person("X", Value::Null));
        let x2 = copied.insert(person("X", Value::Null));
        let list2 = copied.insert(Object::List(Sequence::from_items(
            elem,
            vec![Value::Ref(x1), Value::Ref(x2)],
        )));

        assert!(!graphs_equivalent(
            &shared,
            &Value::Ref(list),
            &copied,
            &Value::Ref(list2)
        ));
    }

    #[test]
    fn test_cycles_terminate() {
        let mut g = Graph::new();
        let a = g.reserve();
        let b = g.insert(person("B", Value::Ref(a)));
        g.complete(a, person("A", Value::Ref(b))).unwrap();

        let h = g.clone();
        assert!(graphs_equivalent(&g, &Value::Ref(a), &h, &Value::Ref(a)));
        assert!(!graphs_equivalent(&g, &Value::Ref(a), &h, &Value::Ref(b)));
    }

    #[test]
    fn test_nan_scalars_compare_by_bits() {
        let g = Graph::new();
        assert!(graphs_equivalent(&g, &Value::f64(f64::NAN), &g, &Value::f64(f64::NAN)));
        assert!(!graphs_equivalent(&g, &Value::f64(0.0), &g, &Value::f64(-0.0)));
    }
}
