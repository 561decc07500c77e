//! Integration tests: multi-layer scan -> report files

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use strata_layer_scanner::{
    LayerInput, ReportSelection, ReportWriter, ScanConfig, Scanner,
};

fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, content) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

#[tokio::test]
async fn alpine_layers_to_reports() {
    let base = tempfile::tempdir().unwrap();
    let app = tempfile::tempdir().unwrap();
    write_tree(
        base.path(),
        &[
            ("etc/alpine-release", "3.19.1\n"),
            (
                "lib/apk/db/installed",
                "P:musl\nV:1.2.4_git20230717-r4\nA:x86_64\nF:lib\nR:ld-musl-x86_64.so.1\n\n",
            ),
            ("lib/ld-musl-x86_64.so.1", "ELF"),
        ],
    );
    write_tree(
        app.path(),
        &[
            (
                "app/node_modules/left-pad/package.json",
                "{\"name\":\"left-pad\",\"version\":\"1.3.0\"}",
            ),
            ("app/node_modules/left-pad/index.js", ""),
            ("app/server.js", ""),
        ],
    );

    let scanner = Arc::new(Scanner::new(ScanConfig::default()).unwrap());
    let inventory = scanner
        .scan_layers(
            vec![
                LayerInput::new("sha256-base", base.path()),
                LayerInput::new("sha256-app", app.path()),
            ],
            None,
        )
        .await;

    assert!(inventory.failures().is_empty());
    let names: Vec<&str> = inventory.packages().iter().map(|p| p.name.as_str()).collect();
    assert!(names.contains(&"musl"));
    assert!(names.contains(&"left-pad"));
    assert_eq!(
        inventory.os_info().and_then(|o| o.release()),
        Some("3.19.1")
    );

    let out = tempfile::tempdir().unwrap();
    let selection = ReportSelection {
        csv: true,
        json: true,
        spdx: true,
    };
    let written = ReportWriter::new(out.path(), "alpine:3.19")
        .write_all(&inventory, selection, Duration::from_millis(42))
        .unwrap();
    assert_eq!(written.len(), 4);

    let csv = fs::read_to_string(out.path().join("alpinetwodots3.19.csv")).unwrap();
    assert!(csv.starts_with("product,version,vendor\n"));
    assert!(csv.contains("left-pad,1.3.0,unknown"));

    let spdx: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(out.path().join("alpinetwodots3.19.spdx.json")).unwrap(),
    )
    .unwrap();
    let purls: Vec<&str> = spdx["packages"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["externalRefs"].as_array())
        .flatten()
        .filter(|r| r["referenceType"] == "purl")
        .filter_map(|r| r["referenceLocator"].as_str())
        .collect();
    assert!(purls.iter().any(|p| p.starts_with("pkg:apk/alpine/musl@")));
    assert!(purls.contains(&"pkg:npm/left-pad@1.3.0"));
    assert!(
        spdx["files"]
            .as_array()
            .unwrap()
            .iter()
            .any(|f| f["comment"] == "Layer: sha256-app" && f["fileName"] == "/app/server.js")
    );

    let log: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(out.path().join("alpinetwodots3.19.log.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(log["elapsed_time"], 42);
    assert_eq!(log["total_files"], 6);
}
