//! End-to-end scenarios through the facade crate

use tempfile::TempDir;
use tessera::{
    Domain, DomainConfig, DriverRegistry, Object, Record, RecordSchema, Sequence, SinceResult,
    TypeIdentity, Value,
};

fn v1() -> std::sync::Arc<DriverRegistry> {
    DriverRegistry::builder()
        .record(RecordSchema::reference("demo.Person").field("Name", Value::Null))
        .build()
}

fn v2() -> std::sync::Arc<DriverRegistry> {
    DriverRegistry::builder()
        .record(
            RecordSchema::reference("demo.Person")
                .version(1)
                .field("Name", Value::Null)
                .field_since("Email", 1, Value::string("unknown")),
        )
        .build()
}

/// An observer that follows a domain through fragments and full exports
struct Observer {
    txn: u64,
    full_exports: usize,
    fragments: usize,
}

impl Observer {
    fn new() -> Self {
        Observer {
            txn: 0,
            full_exports: 0,
            fragments: 0,
        }
    }

    fn sync(&mut self, domain: &Domain) {
        match domain.changes_since(self.txn) {
            SinceResult::Fragments(json) => {
                let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
                for fragment in parsed.as_array().unwrap() {
                    self.txn = fragment["txn"].as_u64().unwrap();
                    self.fragments += 1;
                }
            }
            SinceResult::FullExportRequired => {
                let full = domain.export_full().unwrap();
                serde_json::from_str::<serde_json::Value>(&full.json).unwrap();
                self.txn = full.txn;
                self.full_exports += 1;
            }
        }
    }
}

#[test]
fn test_observer_follows_commits_and_restores() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("people.tsnp");
    let domain = Domain::new("people", v1(), DomainConfig::default());
    let mut observer = Observer::new();

    let list = domain
        .transact(|tx| {
            let list = tx.create(Object::List(Sequence::new(TypeIdentity::new("demo.Person"))))?;
            tx.set_root(Value::Ref(list))?;
            Ok(list)
        })
        .unwrap();
    observer.sync(&domain);
    assert_eq!((observer.txn, observer.fragments), (1, 1));

    for name in ["Ada", "Grace"] {
        domain
            .transact(|tx| {
                let p = tx.create(Object::Record(
                    Record::new("demo.Person").with("Name", Value::string(name)),
                ))?;
                tx.push(list, Value::Ref(p))
            })
            .unwrap();
    }
    domain.save_snapshot(&path).unwrap();
    observer.sync(&domain);
    assert_eq!((observer.txn, observer.fragments), (3, 3));

    // Rewind to the snapshot: the observer cannot patch its way there
    domain.load_snapshot(&path).unwrap();
    observer.sync(&domain);
    assert_eq!(observer.full_exports, 1);
    assert_eq!(observer.txn, domain.last_txn());

    observer.sync(&domain);
    assert_eq!(observer.full_exports, 1);
}

#[test]
fn test_snapshot_from_older_build_gains_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("people.tsnp");

    let old = Domain::new("people", v1(), DomainConfig::default());
    old.transact(|tx| {
        let ada = tx.create(Object::Record(
            Record::new("demo.Person").with("Name", Value::string("Ada")),
        ))?;
        tx.set_root(Value::Ref(ada))
    })
    .unwrap();
    old.save_snapshot(&path).unwrap();

    let new = Domain::new("people", v2(), DomainConfig::default());
    new.load_snapshot(&path).unwrap();
    let email = new.read(|graph, root| {
        graph
            .record(root.as_ref_id().unwrap())
            .unwrap()
            .get("Email")
            .cloned()
    });
    assert_eq!(email, Some(Value::string("unknown")));

    // And the newer snapshot is refused by the older build
    new.save_snapshot(&path).unwrap();
    let err = old.load_snapshot(&path).unwrap_err();
    assert!(err.to_string().contains("newer than local version 0"));
}
