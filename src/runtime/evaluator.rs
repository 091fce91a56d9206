//! Module evaluation
//!
//! [`ModuleEvaluator`] turns block source text into the bindings it exports.
//! The production backend, [`ScriptEvaluator`], runs the source in the
//! embedded script interpreter inside a fresh [`Realm`] whose global scope
//! holds the standard `Object` global and the three names a CommonJS wrapper
//! passes in:
//!
//! - `require`, which forwards to [`DependencyRegistry::resolve`]
//! - `exports`, a mutable container
//! - `module`, whose `exports` field references that container
//!
//! Nothing else from the host is reachable, and no state is shared between
//! two evaluations. This is still not a sandbox: there is no time or memory
//! limit on a module body beyond the interpreter's depth budget.
//!
//! Evaluation runs on its own thread with a stack sized for the deepest
//! evaluation the interpreter permits, whatever thread the caller is on.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use crate::core::{BlockError, BlockSource, DependencyRegistry};
use crate::script::{self, builtins, NativeFunction, Realm, Scope, ScriptError, Value};

/// Stack of the evaluation thread.
const EVALUATION_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Bindings produced by one evaluation, keyed by export name
///
/// Holds the evaluation's [`Realm`]: exported functions keep working for as
/// long as these exports, or a component resolved from them, are alive.
#[derive(Debug, Clone, Default)]
pub struct ModuleExports {
    bindings: BTreeMap<String, Value>,
    pub(crate) realm: Option<Arc<Realm>>,
}

impl ModuleExports {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.bindings.keys().cloned().collect()
    }
}

impl FromIterator<(String, Value)> for ModuleExports {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
            realm: None,
        }
    }
}

/// Executes block source against a dependency allow-list
pub trait ModuleEvaluator: Send + Sync {
    /// Run `source` and collect what it exports
    ///
    /// # Returns
    /// * `Err(BlockError::NotAComponent)` if the source fails the component
    ///   heuristic; the source is not executed in that case
    /// * `Err(BlockError::UnresolvedDependency)` if it requires an unknown name
    /// * `Err(BlockError::EvaluationFailed)` if it does not parse or throws
    fn execute(
        &self,
        source: &BlockSource,
        registry: &DependencyRegistry,
    ) -> Result<ModuleExports, BlockError>;
}

/// Evaluator backed by the embedded script interpreter
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptEvaluator;

impl ModuleEvaluator for ScriptEvaluator {
    fn execute(
        &self,
        source: &BlockSource,
        registry: &DependencyRegistry,
    ) -> Result<ModuleExports, BlockError> {
        if !source.looks_like_component() {
            return Err(BlockError::NotAComponent);
        }

        let realm = Realm::new();
        let exports = realm.object();
        let module = realm.object();
        module.set("exports", Value::Object(exports.clone()));

        let scope = realm.global();
        builtins::install(scope);
        scope.declare("require", require_function(registry));
        scope.declare("module", Value::Object(module.clone()));
        scope.declare("exports", Value::Object(exports));

        run_on_evaluation_thread(source.text(), scope)?;

        // `module.exports` may have been replaced wholesale.
        let bindings = match module.get("exports") {
            Some(Value::Object(obj)) => obj.entries(),
            _ => BTreeMap::new(),
        };
        Ok(ModuleExports {
            bindings,
            realm: Some(Arc::new(realm)),
        })
    }
}

fn run_on_evaluation_thread(source: &str, scope: &Scope) -> Result<(), BlockError> {
    thread::scope(|threads| {
        let handle = thread::Builder::new()
            .name("block-eval".to_string())
            .stack_size(EVALUATION_STACK_SIZE)
            .spawn_scoped(threads, || script::run(source, scope))
            .map_err(|error| {
                BlockError::EvaluationFailed(format!("failed to start evaluation: {}", error))
            })?;
        match handle.join() {
            Ok(result) => result.map_err(BlockError::from),
            Err(_) => Err(BlockError::EvaluationFailed(
                "evaluation panicked".to_string(),
            )),
        }
    })
}

fn require_function(registry: &DependencyRegistry) -> Value {
    let registry = registry.clone();
    Value::Native(NativeFunction::new("require", move |args| {
        let name = match args.first() {
            Some(Value::String(name)) => name.to_string(),
            other => {
                return Err(ScriptError::Type(format!(
                    "require expects a dependency name, got {}",
                    other.map(Value::type_name).unwrap_or("nothing")
                )))
            }
        };
        registry
            .resolve(&name)
            .map_err(|_| ScriptError::UnresolvedDependency(name))
    }))
}
