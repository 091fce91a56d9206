//! Page Build Scheduler
//!
//! Turns block routes into [`PageBundle`]s. Each package path is in one of
//! three states:
//!
//! - **Prebuilt**: a bundle is cached and served directly. Once its freshness
//!   window has elapsed the next request still gets the cached bundle, and a
//!   rebuild starts in the background.
//! - **PendingBuild**: no bundle yet, a build is running and every request
//!   waits for that one build.
//! - **NotFound**: the route is malformed, its org shortname lacks the sigil
//!   (rejected before the store is touched), or the catalog has no such block.
//!
//! At most one build per path is in flight. Callers coalesce on a `watch`
//! channel registered in the slot map, and a finished build replaces the
//! cached bundle in one step under the slot lock, so readers see either the
//! old bundle or the new one. A failed build leaves the old bundle in place.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::evaluator::{ModuleEvaluator, ScriptEvaluator};
use super::exports::ExportResolver;
use super::page::PageBundle;
use super::route::{BlockRoute, DEFAULT_ORG_SIGIL};
use crate::core::{BlockError, DependencyRegistry};
use crate::store::catalog::DEFAULT_METADATA_FILE;
use crate::store::{BlockDataLoader, CatalogReader, ContentStore};

/// Freshness window of a successful build
pub const DEFAULT_REVALIDATE_AFTER: Duration = Duration::from_secs(1800);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub revalidate_after: Duration,
    pub org_sigil: char,
    pub metadata_file: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            revalidate_after: DEFAULT_REVALIDATE_AFTER,
            org_sigil: DEFAULT_ORG_SIGIL,
            metadata_file: DEFAULT_METADATA_FILE.to_string(),
        }
    }
}

/// A block failed somewhere between loading and assembling its page
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("failed to build {package_path}: {source}")]
pub struct BuildError {
    pub package_path: String,
    pub source: BlockError,
}

/// What a page request can fail with
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PageError {
    #[error("page not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Build(#[from] BuildError),
}

pub type BuildOutcome = Result<Arc<PageBundle>, PageError>;

/// Observable state of one package path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PageState {
    Prebuilt { fresh: bool, revalidating: bool },
    PendingBuild,
    Unknown,
}

/// Result of building every catalog path ahead of time
#[derive(Debug, Clone, Default, Serialize)]
pub struct PrebuildReport {
    pub built: Vec<String>,
    pub failed: BTreeMap<String, String>,
}

/// Anything that can hand out block pages by request path
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn page(&self, path: &str) -> Result<Arc<PageBundle>, PageError>;
}

struct CachedPage {
    bundle: Arc<PageBundle>,
    /// `None` when the window is too long to represent: never stale.
    fresh_until: Option<Instant>,
}

impl CachedPage {
    fn is_fresh(&self, now: Instant) -> bool {
        self.fresh_until.map_or(true, |until| now < until)
    }
}

#[derive(Default)]
struct Slot {
    page: Option<CachedPage>,
    in_flight: Option<watch::Receiver<Option<BuildOutcome>>>,
}

enum Claim {
    Ready(Arc<PageBundle>),
    Wait(watch::Receiver<Option<BuildOutcome>>),
}

struct Inner<S, E> {
    store: Arc<S>,
    registry: DependencyRegistry,
    evaluator: E,
    config: SchedulerConfig,
    slots: Mutex<HashMap<String, Slot>>,
}

pub struct PageBuildScheduler<S, E = ScriptEvaluator> {
    inner: Arc<Inner<S, E>>,
}

impl<S, E> Clone for PageBuildScheduler<S, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ContentStore + 'static> PageBuildScheduler<S, ScriptEvaluator> {
    pub fn new(store: Arc<S>, registry: DependencyRegistry, config: SchedulerConfig) -> Self {
        Self::with_evaluator(store, registry, ScriptEvaluator, config)
    }
}

impl<S, E> PageBuildScheduler<S, E>
where
    S: ContentStore + 'static,
    E: ModuleEvaluator + 'static,
{
    pub fn with_evaluator(
        store: Arc<S>,
        registry: DependencyRegistry,
        evaluator: E,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                registry,
                evaluator,
                config,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Serve the page for a request path such as `/@org/blocks/demo`.
    pub async fn request(&self, path: &str) -> BuildOutcome {
        match BlockRoute::parse(path) {
            Some(route) => self.request_route(&route).await,
            None => {
                tracing::debug!(path, "not a block route");
                Err(PageError::NotFound(path.to_string()))
            }
        }
    }

    pub async fn request_path(&self, org_shortname: &str, block_slug: &str) -> BuildOutcome {
        let route = BlockRoute {
            org_shortname: org_shortname.to_string(),
            block_slug: block_slug.to_string(),
        };
        self.request_route(&route).await
    }

    pub async fn request_route(&self, route: &BlockRoute) -> BuildOutcome {
        if !route.has_sigil(self.inner.config.org_sigil) {
            tracing::debug!(route = %route, "org shortname lacks sigil");
            return Err(PageError::NotFound(route.to_string()));
        }

        let package_path = route.package_path();
        match self.claim(&package_path) {
            Claim::Ready(bundle) => Ok(bundle),
            Claim::Wait(rx) => wait_for_outcome(rx, &package_path).await,
        }
    }

    /// Build every catalog path, blocking until all builds have finished.
    pub async fn prebuild(&self) -> Result<PrebuildReport, BlockError> {
        let scheduler = self.clone();
        let routes = tokio::task::spawn_blocking(move || scheduler.paths())
            .await
            .map_err(|e| BlockError::Io(e.to_string()))??;

        let mut builds = JoinSet::new();
        for route in routes {
            let scheduler = self.clone();
            builds.spawn(async move {
                let outcome = scheduler.request_route(&route).await;
                (route.package_path(), outcome)
            });
        }

        let mut report = PrebuildReport::default();
        while let Some(joined) = builds.join_next().await {
            match joined {
                Ok((package_path, Ok(_))) => report.built.push(package_path),
                Ok((package_path, Err(error))) => {
                    tracing::warn!(package = %package_path, %error, "prebuild failed");
                    report.failed.insert(package_path, error.to_string());
                }
                Err(error) => tracing::warn!(%error, "prebuild task did not finish"),
            }
        }
        report.built.sort();

        tracing::info!(
            built = report.built.len(),
            failed = report.failed.len(),
            "prebuild complete"
        );
        Ok(report)
    }

    /// Routes of every catalog entry, in catalog order. Reads the store.
    pub fn paths(&self) -> Result<Vec<BlockRoute>, BlockError> {
        Ok(self
            .inner
            .catalog_reader()
            .discover_all()?
            .iter()
            .filter_map(|metadata| BlockRoute::from_package_path(&metadata.package_path))
            .collect())
    }

    pub fn state(&self, package_path: &str) -> PageState {
        let slots = self.inner.slots.lock();
        match slots.get(package_path) {
            Some(Slot {
                page: Some(page),
                in_flight,
            }) => PageState::Prebuilt {
                fresh: page.is_fresh(Instant::now()),
                revalidating: in_flight.is_some(),
            },
            Some(Slot {
                in_flight: Some(_),
                ..
            }) => PageState::PendingBuild,
            _ => PageState::Unknown,
        }
    }

    /// Wait for the in-flight build of `package_path`, if there is one.
    pub async fn settle(&self, package_path: &str) -> Option<BuildOutcome> {
        let rx = self
            .inner
            .slots
            .lock()
            .get(package_path)
            .and_then(|slot| slot.in_flight.clone())?;
        Some(wait_for_outcome(rx, package_path).await)
    }

    fn claim(&self, package_path: &str) -> Claim {
        let mut slots = self.inner.slots.lock();
        let slot = slots.entry(package_path.to_string()).or_default();

        if let Some(page) = &slot.page {
            if !page.is_fresh(Instant::now()) && slot.in_flight.is_none() {
                tracing::info!(package = %package_path, "page is stale, revalidating");
                slot.in_flight = Some(self.spawn_build(package_path));
            }
            return Claim::Ready(Arc::clone(&page.bundle));
        }

        match &slot.in_flight {
            Some(rx) => Claim::Wait(rx.clone()),
            None => {
                let rx = self.spawn_build(package_path);
                slot.in_flight = Some(rx.clone());
                Claim::Wait(rx)
            }
        }
    }

    fn spawn_build(&self, package_path: &str) -> watch::Receiver<Option<BuildOutcome>> {
        let (tx, rx) = watch::channel(None);
        let inner = Arc::clone(&self.inner);
        let package_path = package_path.to_string();

        tokio::spawn(async move {
            let mut guard = InFlightGuard {
                inner: Arc::clone(&inner),
                package_path: package_path.clone(),
                armed: true,
            };
            let started = Instant::now();
            let builder = Arc::clone(&inner);
            let path = package_path.clone();
            let outcome = match tokio::task::spawn_blocking(move || builder.build(&path)).await {
                Ok(result) => result.map(Arc::new),
                Err(error) => Err(PageError::Build(BuildError {
                    package_path: package_path.clone(),
                    source: BlockError::EvaluationFailed(error.to_string()),
                })),
            };

            match &outcome {
                Ok(bundle) => tracing::info!(
                    package = %package_path,
                    build_id = %bundle.build_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "page built"
                ),
                Err(error) => tracing::warn!(package = %package_path, %error, "page build failed"),
            }

            inner.complete(&package_path, &outcome);
            guard.armed = false;
            tx.send_replace(Some(outcome));
        });

        rx
    }
}

impl<S: ContentStore, E: ModuleEvaluator> Inner<S, E> {
    fn catalog_reader(&self) -> CatalogReader<S> {
        CatalogReader::with_metadata_file(Arc::clone(&self.store), &self.config.metadata_file)
    }

    fn build(&self, package_path: &str) -> Result<PageBundle, PageError> {
        let failed = |source: BlockError| BuildError {
            package_path: package_path.to_string(),
            source,
        };

        let catalog = self.catalog_reader().discover_all().map_err(failed)?;
        let metadata = catalog
            .iter()
            .find(|metadata| metadata.package_path == package_path)
            .cloned()
            .ok_or_else(|| PageError::NotFound(package_path.to_string()))?;

        let data = BlockDataLoader::new(Arc::clone(&self.store))
            .load_one(&metadata)
            .map_err(failed)?;
        let exports = self
            .evaluator
            .execute(&data.source, &self.registry)
            .map_err(failed)?;
        let component = ExportResolver::resolve(exports).map_err(failed)?;

        Ok(PageBundle::assemble(metadata, data, component, &catalog))
    }

    fn complete(&self, package_path: &str, outcome: &BuildOutcome) {
        let mut slots = self.slots.lock();
        match outcome {
            Ok(bundle) => {
                let slot = slots.entry(package_path.to_string()).or_default();
                slot.page = Some(CachedPage {
                    bundle: Arc::clone(bundle),
                    fresh_until: Instant::now().checked_add(self.config.revalidate_after),
                });
                slot.in_flight = None;
            }
            // The block left the catalog; stop serving it.
            Err(PageError::NotFound(_)) => {
                slots.remove(package_path);
            }
            Err(PageError::Build(_)) => {
                let keep = match slots.get_mut(package_path) {
                    Some(slot) => {
                        slot.in_flight = None;
                        slot.page.is_some()
                    }
                    None => true,
                };
                if !keep {
                    slots.remove(package_path);
                }
            }
        }
    }
}

impl<S, E> Inner<S, E> {
    /// Forget an in-flight build that ended without completing.
    fn abandon(&self, package_path: &str) {
        let mut slots = self.slots.lock();
        let empty = match slots.get_mut(package_path) {
            Some(slot) => {
                slot.in_flight = None;
                slot.page.is_none()
            }
            None => false,
        };
        if empty {
            slots.remove(package_path);
        }
    }
}

/// Clears the in-flight marker if a build task unwinds before completing,
/// so the next request starts a fresh build instead of waiting forever.
struct InFlightGuard<S, E> {
    inner: Arc<Inner<S, E>>,
    package_path: String,
    armed: bool,
}

impl<S, E> Drop for InFlightGuard<S, E> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(package = %self.package_path, "page build abandoned");
            self.inner.abandon(&self.package_path);
        }
    }
}

async fn wait_for_outcome(
    mut rx: watch::Receiver<Option<BuildOutcome>>,
    package_path: &str,
) -> BuildOutcome {
    let outcome = match rx.wait_for(Option::is_some).await {
        Ok(outcome) => outcome.clone(),
        Err(_) => None,
    };
    outcome.unwrap_or_else(|| {
        Err(PageError::Build(BuildError {
            package_path: package_path.to_string(),
            source: BlockError::EvaluationFailed("build ended without a result".to_string()),
        }))
    })
}

#[async_trait]
impl<S, E> PageSource for PageBuildScheduler<S, E>
where
    S: ContentStore + 'static,
    E: ModuleEvaluator + 'static,
{
    async fn page(&self, path: &str) -> Result<Arc<PageBundle>, PageError> {
        self.request(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::catalog::{DEFAULT_SCHEMA_FILE, DEFAULT_SOURCE_FILE};
    use crate::store::MemoryContentStore;

    const SOURCE: &str = r#"
        var React = require("react");
        exports.default = function Demo() { return React.createElement("div", null, "demo"); };
    "#;

    fn store_with(blocks: &[&str]) -> Arc<MemoryContentStore> {
        let store = Arc::new(MemoryContentStore::new());
        for package_path in blocks {
            store.insert_file(
                package_path,
                DEFAULT_METADATA_FILE,
                r#"{"name": "demo", "version": "0.1.0"}"#,
            );
            store.insert_file(package_path, DEFAULT_SCHEMA_FILE, r#"{"type": "object"}"#);
            store.insert_file(package_path, DEFAULT_SOURCE_FILE, SOURCE);
        }
        store
    }

    fn scheduler(store: Arc<MemoryContentStore>) -> PageBuildScheduler<MemoryContentStore> {
        PageBuildScheduler::new(store, DependencyRegistry::standard(), SchedulerConfig::default())
    }

    #[tokio::test]
    async fn test_builds_and_caches_page() {
        let store = store_with(&["@org/demo", "@org/other"]);
        let scheduler = scheduler(Arc::clone(&store));

        assert_eq!(scheduler.state("@org/demo"), PageState::Unknown);
        let first = scheduler.request("/@org/blocks/demo").await.unwrap();
        assert_eq!(first.metadata.package_path, "@org/demo");
        assert_eq!(first.component.export_name, "default");
        assert_eq!(first.siblings.len(), 1);
        assert_eq!(first.siblings[0].package_path, "@org/other");
        assert_eq!(
            scheduler.state("@org/demo"),
            PageState::Prebuilt {
                fresh: true,
                revalidating: false
            }
        );

        let reads = store.access_count();
        let second = scheduler.request_path("@org", "demo").await.unwrap();
        assert_eq!(second.build_id, first.build_id);
        assert_eq!(store.access_count(), reads);
    }

    #[tokio::test]
    async fn test_unknown_block_is_not_found() {
        let scheduler = scheduler(store_with(&["@org/demo"]));
        let err = scheduler.request("/@org/blocks/missing").await.unwrap_err();
        assert_eq!(err, PageError::NotFound("@org/missing".into()));
        assert_eq!(scheduler.state("@org/missing"), PageState::Unknown);
    }

    #[tokio::test]
    async fn test_malformed_route_is_not_found() {
        let store = store_with(&["@org/demo"]);
        let scheduler = scheduler(Arc::clone(&store));
        assert!(matches!(
            scheduler.request("/@org/demo").await,
            Err(PageError::NotFound(_))
        ));
        assert_eq!(store.access_count(), 0);
    }

    #[tokio::test]
    async fn test_build_failure_is_reported() {
        let store = store_with(&["@org/demo"]);
        store.insert_file("@org/demo", DEFAULT_SOURCE_FILE, "exports.default = 1;");
        let scheduler = scheduler(store);

        let err = scheduler.request("/@org/blocks/demo").await.unwrap_err();
        assert_eq!(
            err,
            PageError::Build(BuildError {
                package_path: "@org/demo".into(),
                source: BlockError::NotAComponent,
            })
        );
        assert_eq!(scheduler.state("@org/demo"), PageState::Unknown);
    }

    #[tokio::test]
    async fn test_paths_and_prebuild() {
        let store = store_with(&["@b/two", "@a/one", "plain/skipped"]);
        store.insert_file("@b/two", DEFAULT_SOURCE_FILE, "exports.a = 1; exports.b = 2; createElement");
        let scheduler = scheduler(store);

        let paths: Vec<String> = scheduler
            .paths()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            paths,
            vec!["/@a/blocks/one", "/@b/blocks/two", "/plain/blocks/skipped"]
        );

        let report = scheduler.prebuild().await.unwrap();
        assert_eq!(report.built, vec!["@a/one".to_string()]);
        assert_eq!(report.failed.len(), 2);
        assert!(report.failed["@b/two"].contains("found: [a, b]"));
        assert!(report.failed.contains_key("plain/skipped"));
    }

    #[tokio::test]
    async fn test_unbounded_freshness_window() {
        let config = SchedulerConfig {
            revalidate_after: Duration::MAX,
            ..SchedulerConfig::default()
        };
        let scheduler =
            PageBuildScheduler::new(store_with(&["@org/demo"]), DependencyRegistry::standard(), config);

        let first = scheduler.request("/@org/blocks/demo").await.unwrap();
        assert_eq!(
            scheduler.state("@org/demo"),
            PageState::Prebuilt {
                fresh: true,
                revalidating: false
            }
        );
        let second = scheduler.request("/@org/blocks/demo").await.unwrap();
        assert_eq!(second.build_id, first.build_id);
    }

    #[tokio::test]
    async fn test_abandoned_build_releases_slot() {
        let scheduler = scheduler(store_with(&["@org/demo"]));
        let (_tx, rx) = watch::channel(None);
        scheduler.inner.slots.lock().insert(
            "@org/demo".to_string(),
            Slot {
                page: None,
                in_flight: Some(rx),
            },
        );
        assert_eq!(scheduler.state("@org/demo"), PageState::PendingBuild);

        drop(InFlightGuard {
            inner: Arc::clone(&scheduler.inner),
            package_path: "@org/demo".to_string(),
            armed: true,
        });
        assert_eq!(scheduler.state("@org/demo"), PageState::Unknown);

        // The next request starts a new build instead of waiting on the dead one.
        let bundle = scheduler.request("/@org/blocks/demo").await.unwrap();
        assert_eq!(bundle.metadata.package_path, "@org/demo");
    }

    #[tokio::test]
    async fn test_settle_without_build() {
        let scheduler = scheduler(store_with(&["@org/demo"]));
        assert!(scheduler.settle("@org/demo").await.is_none());
    }

    #[tokio::test]
    async fn test_page_source_trait() {
        let source: Box<dyn PageSource> = Box::new(scheduler(store_with(&["@org/demo"])));
        let bundle = source.page("/@org/blocks/demo/").await.unwrap();
        assert_eq!(bundle.metadata.slug(), "demo");
    }
}
