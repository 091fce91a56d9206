//! Export resolution
//!
//! Picks "the" component out of a module's exports. The rules are tried in a
//! fixed order and the first one that matches wins:
//!
//! 1. the `default` binding
//! 2. the `App` binding
//! 3. the only binding, whatever its name
//!
//! Anything else is [`BlockError::AmbiguousExport`]. A conventional binding
//! only counts when its value is truthy, as in the page host blocks were
//! written against; `exports.default = undefined` falls through to `App`.

use std::sync::Arc;

use serde::Serialize;

use super::evaluator::ModuleExports;
use crate::core::BlockError;
use crate::script::{Realm, Value};

pub const PRIMARY_EXPORT: &str = "default";
pub const ALTERNATE_EXPORT: &str = "App";

/// Which precedence rule selected a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportRule {
    Primary,
    Alternate,
    Sole,
}

impl ExportRule {
    /// Evaluation order. Never reorder.
    pub const PRECEDENCE: [ExportRule; 3] =
        [ExportRule::Primary, ExportRule::Alternate, ExportRule::Sole];

    fn select(self, exports: &ModuleExports) -> Option<String> {
        match self {
            ExportRule::Primary => conventional(exports, PRIMARY_EXPORT),
            ExportRule::Alternate => conventional(exports, ALTERNATE_EXPORT),
            ExportRule::Sole if exports.len() == 1 => exports.names().into_iter().next(),
            ExportRule::Sole => None,
        }
    }
}

fn conventional(exports: &ModuleExports, name: &str) -> Option<String> {
    exports
        .get(name)
        .filter(|value| value.is_truthy())
        .map(|_| name.to_string())
}

/// The exported value chosen as a block's component
///
/// Keeps the module's realm alive, so the component stays callable for as
/// long as this reference (or the page holding it) exists. The realm is
/// released with the last reference.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRef {
    pub export_name: String,
    pub rule: ExportRule,
    pub value: Value,
    #[serde(skip)]
    _realm: Option<Arc<Realm>>,
}

pub struct ExportResolver;

impl ExportResolver {
    /// Apply the precedence chain, consuming the exports.
    pub fn resolve(exports: ModuleExports) -> Result<ComponentRef, BlockError> {
        for rule in ExportRule::PRECEDENCE {
            if let Some(export_name) = rule.select(&exports) {
                let value = match exports.get(&export_name) {
                    Some(value) => value.clone(),
                    None => continue,
                };
                return Ok(ComponentRef {
                    export_name,
                    rule,
                    value,
                    _realm: exports.realm.clone(),
                });
            }
        }
        Err(BlockError::AmbiguousExport(exports.names()))
    }
}
