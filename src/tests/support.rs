//! Shared fixtures for the test suite

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::core::{BlockError, BlockSource, DependencyRegistry};
use crate::runtime::{ModuleEvaluator, ModuleExports, ScriptEvaluator};
use crate::store::catalog::{DEFAULT_METADATA_FILE, DEFAULT_SCHEMA_FILE, DEFAULT_SOURCE_FILE};
use crate::store::MemoryContentStore;

pub const COMPONENT_SOURCE: &str = r#"
    "use strict";
    var React = require("react");
    function Demo(props) {
        return React.createElement("div", { className: "demo" }, props.text);
    }
    exports.default = Demo;
"#;

pub const SCHEMA: &str = r#"{
    "$id": "https://example.com/demo.schema.json",
    "type": "object",
    "properties": { "text": { "type": "string" } }
}"#;

/// Write a complete block into an in-memory store.
pub fn insert_block(store: &MemoryContentStore, package_path: &str, display_name: &str) {
    let metadata = serde_json::json!({
        "name": package_path,
        "displayName": display_name,
        "version": "1.0.0",
        "description": format!("{} block", display_name),
        "icon": "public/icon.svg",
        "repository": "https://github.com/blockprotocol/blocks/tree/main/demo",
    });
    store.insert_file(package_path, DEFAULT_METADATA_FILE, metadata.to_string());
    store.insert_file(package_path, DEFAULT_SCHEMA_FILE, SCHEMA);
    store.insert_file(package_path, DEFAULT_SOURCE_FILE, COMPONENT_SOURCE);
}

pub fn store_with(package_paths: &[&str]) -> Arc<MemoryContentStore> {
    let store = Arc::new(MemoryContentStore::new());
    for package_path in package_paths {
        insert_block(&store, package_path, package_path);
    }
    store
}

/// A latch the evaluator can be parked on from a blocking thread
#[derive(Clone)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    pub fn opened() -> Self {
        Gate(Arc::new((Mutex::new(true), Condvar::new())))
    }

    pub fn closed() -> Self {
        Gate(Arc::new((Mutex::new(false), Condvar::new())))
    }

    pub fn open(&self) {
        *self.0 .0.lock() = true;
        self.0 .1.notify_all();
    }

    pub fn close(&self) {
        *self.0 .0.lock() = false;
    }

    pub fn wait(&self) {
        let (open, condvar) = &*self.0;
        let mut open = open.lock();
        while !*open {
            condvar.wait(&mut open);
        }
    }
}

/// Script evaluator that counts calls and can be held at a gate
#[derive(Clone)]
pub struct CountingEvaluator {
    calls: Arc<AtomicUsize>,
    gate: Gate,
}

impl CountingEvaluator {
    pub fn new(gate: Gate) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            gate,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModuleEvaluator for CountingEvaluator {
    fn execute(
        &self,
        source: &BlockSource,
        registry: &DependencyRegistry,
    ) -> Result<ModuleExports, BlockError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.wait();
        ScriptEvaluator.execute(source, registry)
    }
}

/// Poll `condition` until it holds, failing the test after a few seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
