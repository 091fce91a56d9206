//! End-to-end: an on-disk content store served through the scheduler
//!
//! Lays out a small content root the way the hub expects it:
//!   {root}/{org}/{slug}/block-metadata.json
//!                      /block-schema.json
//!                      /main.js

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::HubConfig;
use crate::core::{BlockError, DependencyRegistry};
use crate::runtime::{ExportRule, PageBuildScheduler, PageError, PageSource};
use crate::store::{CatalogReader, FsContentStore};
use crate::tests::support::{COMPONENT_SOURCE, SCHEMA};

fn write_block(root: &Path, package_path: &str, metadata: serde_json::Value, source: &str) {
    let dir = root.join(package_path);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("block-metadata.json"), metadata.to_string()).unwrap();
    fs::write(dir.join("block-schema.json"), SCHEMA).unwrap();
    fs::write(dir.join("main.js"), source).unwrap();
}

fn content_root() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();

    write_block(
        root.path(),
        "@hash/code",
        serde_json::json!({
            "name": "@hashintel/block-code",
            "displayName": "Code",
            "version": "0.2.1",
            "description": "Write code",
            "icon": "public/code.svg",
            "repository": {
                "type": "git",
                "url": "https://github.com/hashintel/hash/tree/main/packages/blocks/code"
            },
            "lastUpdated": "2022-03-01T12:00:00Z"
        }),
        COMPONENT_SOURCE,
    );
    write_block(
        root.path(),
        "@hash/embed",
        serde_json::json!({
            "name": "embed",
            "version": "1.0.0",
            "source": "dist/main.js"
        }),
        "",
    );
    // The descriptor points at a nested bundle.
    let nested = root.path().join("@hash/embed/dist");
    fs::create_dir_all(&nested).unwrap();
    fs::write(
        nested.join("main.js"),
        r#"
        var jsx = require("react/jsx-runtime").jsx;
        var React = require("react");
        module.exports = {
            App: function (props) {
                return jsx("iframe", { src: props.url });
            },
            createElement: React.createElement,
        };
        "#,
    )
    .unwrap();
    write_block(
        root.path(),
        "@other/broken",
        serde_json::json!({ "name": "broken", "version": "1.0.0" }),
        "var lodash = require('lodash'); exports.default = lodash.createElement;",
    );
    // No descriptor at all.
    fs::create_dir_all(root.path().join("@other/draft")).unwrap();

    root
}

#[test]
fn test_catalog_from_disk() {
    let root = content_root();
    let store = Arc::new(FsContentStore::new(root.path()).unwrap());
    let catalog = CatalogReader::new(store).discover_all().unwrap();

    let paths: Vec<&str> = catalog.iter().map(|m| m.package_path.as_str()).collect();
    assert_eq!(paths, vec!["@hash/code", "@hash/embed", "@other/broken"]);

    let code = &catalog[0];
    assert_eq!(code.display_name, "Code");
    assert_eq!(code.icon.as_deref(), Some("/blocks/@hash/code/public/code.svg"));
    assert_eq!(code.last_updated.as_deref(), Some("2022-03-01T12:00:00Z"));
    assert_eq!(catalog[1].display_name, "embed");
    assert_eq!(catalog[1].source, "dist/main.js");
}

#[tokio::test]
async fn test_build_pages_from_disk() {
    let root = content_root();
    let config = HubConfig::from_toml(&format!(
        "content_root = {:?}\nrevalidate_secs = 1800\n",
        root.path().display().to_string()
    ))
    .unwrap();
    let store = Arc::new(FsContentStore::new(&config.content_root).unwrap());
    let scheduler = PageBuildScheduler::new(
        store,
        DependencyRegistry::standard(),
        config.scheduler_config(),
    );

    let code = scheduler.page("/@hash/blocks/code").await.unwrap();
    assert_eq!(code.metadata.version, "0.2.1");
    assert_eq!(code.component.rule, ExportRule::Primary);
    assert_eq!(
        code.repository_display_url.as_deref(),
        Some("github.com/hashintel/hash")
    );
    let siblings: Vec<&str> = code.siblings.iter().map(|m| m.package_path.as_str()).collect();
    assert_eq!(siblings, vec!["@hash/embed", "@other/broken"]);

    let embed = scheduler.page("/@hash/blocks/embed").await.unwrap();
    assert_eq!(embed.component.export_name, "App");

    let err = scheduler.page("/@other/blocks/broken").await.unwrap_err();
    assert_eq!(
        err,
        PageError::Build(crate::runtime::BuildError {
            package_path: "@other/broken".into(),
            source: BlockError::UnresolvedDependency("lodash".into()),
        })
    );

    assert!(matches!(
        scheduler.page("/@other/blocks/draft").await,
        Err(PageError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_prebuild_from_disk() {
    let root = content_root();
    let store = Arc::new(FsContentStore::new(root.path()).unwrap());
    let scheduler = PageBuildScheduler::new(
        store,
        DependencyRegistry::standard(),
        Default::default(),
    );

    let report = scheduler.prebuild().await.unwrap();
    assert_eq!(report.built, vec!["@hash/code".to_string(), "@hash/embed".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed["@other/broken"].contains("missing dependency lodash"));

    let bundle = scheduler.request("/@hash/blocks/code").await.unwrap();
    let json = serde_json::to_value(&*bundle).unwrap();
    assert_eq!(json["metadata"]["packagePath"], "@hash/code");
    assert_eq!(json["component"]["exportName"], "default");
    assert_eq!(json["schema"]["type"], "object");
}
