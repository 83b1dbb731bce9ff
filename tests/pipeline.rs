//! Scan a small survey tree, build an index with the hashing embedder and
//! query it back from disk.

use std::path::Path;

use surveycat::{
    DataDir,
    Index,
    ModelManager,
    config::default_categories,
    embedding::HashingEmbedder,
    index_builder::{BuildOptions, build_from_paths, write_artifacts},
    matcher::TermMatcher,
    readers::{ReadLimits, ReaderRegistry},
    scanner::{self, ScanStatus},
    search::{Query, execute_search},
    walker::{WalkOptions, discover_targets},
};

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

fn survey_tree(root: &Path) {
    write(
        root,
        "aerial/dugong_aerial.csv",
        "species,count,lat\nDugong,3,27.1\nbottlenose dolphin,2,27.3\n",
    );
    write(
        root,
        "beach/nests.csv",
        "site,notes\nRas Al Sheikh,green turtle tracks\n",
    );
    // Geodatabases are matched on their path only: "osprey" is a directory.
    write(root, "osprey/colony.gdb/a00000001.gdbtable", "dugong");
    // No .dbf sidecar, so reading fails and the row is excluded from the index.
    write(root, "broken/coastline.shp", "shp");
    write(root, "notes.txt", "dugong");
}

#[test]
fn scan_build_and_search() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("surveys");
    survey_tree(&root);
    let data_dir = DataDir::resolve(Some(&tmp.path().join("data"))).unwrap();

    let categories = default_categories();
    let names: Vec<String> = categories.iter().map(|c| c.name.clone()).collect();
    let matcher = TermMatcher::new(&categories).unwrap();

    let options = WalkOptions::new(&[], u64::MAX).unwrap();
    let targets = discover_targets(&root, &options).unwrap();
    assert_eq!(targets.len(), 4, "the .txt file is not a survey file");

    let report = scanner::scan_all(
        &targets,
        &matcher,
        &ReaderRegistry::with_builtin(),
        ReadLimits::default(),
        false,
    );
    assert_eq!(report.errors(), 1);
    scanner::write_scan_csv(&report, &data_dir.scan_csv()).unwrap();

    let reread = scanner::read_scan_csv(&data_dir.scan_csv(), &names).unwrap();
    let broken = reread
        .records
        .iter()
        .find(|r| r.file_name == "coastline.shp")
        .unwrap();
    assert_eq!(broken.status, ScanStatus::Error);
    assert!(!broken.error.is_empty());

    let embedder = HashingEmbedder::new(1024).unwrap();
    let build = BuildOptions {
        categories: &names,
        embedder: &embedder,
        batch_size: 2,
        show_progress: false,
    };
    let built = build_from_paths(&data_dir.scan_csv(), None, &build).unwrap();
    assert_eq!(built.manifest.records, 3);
    write_artifacts(&built, &data_dir).unwrap();

    let index = Index::load(&data_dir, &names, &embedder).unwrap();
    assert_eq!(index.len(), 3);

    let stats = index.stats();
    assert_eq!(stats.by_type["table"], 2);
    assert_eq!(stats.by_type["geodatabase"], 1);
    assert_eq!(stats.by_category["marine_mammals"], 1);
    assert_eq!(stats.by_category["birds"], 1);

    // Listing without query text is alphabetical by name.
    let listing = execute_search(&Query::default(), &index, &embedder).unwrap();
    let listed: Vec<_> = listing.results.iter().map(|r| r.file_name.as_str()).collect();
    assert_eq!(listed, ["colony.gdb", "dugong_aerial.csv", "nests.csv"]);
    assert!(listing.results.iter().all(|r| r.score.is_none()));

    let mut query = Query::new("dugong");
    query
        .category_filters
        .insert("marine_mammals".into(), "BOTTLENOSE".into());
    let outcome = execute_search(&query, &index, &embedder).unwrap();
    assert_eq!(outcome.total_matches, 1);
    let hit = &outcome.results[0];
    assert_eq!(hit.file_name, "dugong_aerial.csv");
    assert_eq!(hit.file_type, "table");
    assert!(hit.score.is_some());
    assert!(hit.categories["marine_mammals"].contains("dugong"));

    let ranked = execute_search(&Query::new("dugong"), &index, &embedder).unwrap();
    assert_eq!(ranked.total_matches, 3);
    assert_eq!(ranked.results[0].file_name, "dugong_aerial.csv");

    let mut turtles = Query::default();
    turtles.category_filters.insert("reptiles".into(), "turtle".into());
    turtles.exclude = Some("aerial".into());
    let outcome = execute_search(&turtles, &index, &embedder).unwrap();
    let found: Vec<_> = outcome.results.iter().map(|r| r.file_name.as_str()).collect();
    assert_eq!(found, ["nests.csv"]);
}

#[test]
fn build_merges_metadata_with_scan_categories() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("surveys");
    write(&root, "aerial/dugong.csv", "species\nDugong\n");
    let data_dir = DataDir::resolve(Some(&tmp.path().join("data"))).unwrap();

    let categories = default_categories();
    let names: Vec<String> = categories.iter().map(|c| c.name.clone()).collect();
    let matcher = TermMatcher::new(&categories).unwrap();
    let targets =
        discover_targets(&root, &WalkOptions::new(&[], u64::MAX).unwrap()).unwrap();
    let report = scanner::scan_all(
        &targets,
        &matcher,
        &ReaderRegistry::with_builtin(),
        ReadLimits::default(),
        false,
    );
    scanner::write_scan_csv(&report, &data_dir.scan_csv()).unwrap();

    let scanned_path = root.join("aerial/dugong.csv");
    let metadata_dir = tmp.path().join("metadata");
    write(
        &metadata_dir,
        "csv_xlsx_tables_metadata.csv",
        &format!(
            "file_path,file_name,file_extension,Species,activity,column_names,row_count\n\
             {},dugong.csv,.csv,Dugong,aerial survey,species,1\n\
             /elsewhere/other.csv,other.csv,.csv,,,,\n",
            scanned_path.display()
        ),
    );

    let embedder = HashingEmbedder::new(64).unwrap();
    let build = BuildOptions {
        categories: &names,
        embedder: &embedder,
        batch_size: 16,
        show_progress: false,
    };
    let built =
        build_from_paths(&data_dir.scan_csv(), Some(&metadata_dir), &build).unwrap();

    // The scanned file is described by its metadata row, not duplicated.
    assert_eq!(built.records.len(), 2);
    let merged = &built.records[0];
    assert_eq!(merged.species, "Dugong");
    assert_eq!(merged.activity, "aerial survey");
    assert_eq!(merged.category("marine_mammals"), "dugong");
    assert_eq!(built.records[1].category("marine_mammals"), "");

    assert!(built.filters["species"].contains("Dugong"));
    assert!(built.filters["type"].contains("table"));
}

#[test]
fn load_without_build_reports_missing_artifact() {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = DataDir::resolve(Some(tmp.path())).unwrap();
    let embedder = HashingEmbedder::new(8).unwrap();
    let err = Index::load(&data_dir, &["birds".to_string()], &embedder).unwrap_err();
    assert!(matches!(err, surveycat::Error::MissingArtifact(_)));
}

#[test]
fn load_rejects_index_from_another_embedder() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("surveys");
    write(&root, "aerial/dugong.csv", "species\nDugong\n");
    let data_dir = DataDir::resolve(Some(&tmp.path().join("data"))).unwrap();

    let categories = default_categories();
    let names: Vec<String> = categories.iter().map(|c| c.name.clone()).collect();
    let targets =
        discover_targets(&root, &WalkOptions::new(&[], u64::MAX).unwrap()).unwrap();
    let report = scanner::scan_all(
        &targets,
        &TermMatcher::new(&categories).unwrap(),
        &ReaderRegistry::with_builtin(),
        ReadLimits::default(),
        false,
    );
    scanner::write_scan_csv(&report, &data_dir.scan_csv()).unwrap();

    // Same dimension as the default sentence model.
    let hashing = HashingEmbedder::new(384).unwrap();
    let build = BuildOptions {
        categories: &names,
        embedder: &hashing,
        batch_size: 16,
        show_progress: false,
    };
    let built = build_from_paths(&data_dir.scan_csv(), None, &build).unwrap();
    write_artifacts(&built, &data_dir).unwrap();

    let model = ModelManager::default();
    let err = Index::load(&data_dir, &names, &model).unwrap_err();
    assert!(
        matches!(&err, surveycat::Error::SchemaMismatch(m) if m.contains("feature-hashing")),
        "{err}"
    );
    assert!(!model.is_loaded());

    assert!(Index::load(&data_dir, &names, &hashing).is_ok());
}
