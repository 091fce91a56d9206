//! Block page runtime
//!
//! Evaluates block sources, picks their components and schedules the page
//! builds that serve them.

pub mod evaluator;
pub mod exports;
pub mod page;
pub mod route;
pub mod scheduler;

pub use evaluator::{ModuleEvaluator, ModuleExports, ScriptEvaluator};
pub use exports::{ComponentRef, ExportResolver, ExportRule};
pub use page::PageBundle;
pub use route::BlockRoute;
pub use scheduler::{
    BuildError, BuildOutcome, PageBuildScheduler, PageError, PageSource, PageState,
    PrebuildReport, SchedulerConfig,
};
