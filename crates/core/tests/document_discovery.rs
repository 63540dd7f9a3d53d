use std::fs;
use std::path::PathBuf;

use metaplate_core::{
    DimensionBindings, DiscoveryError, LoaderError, discover_documents, load_document,
    resolve,
};
use tempfile::tempdir;

fn write_file(path: &PathBuf, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn discovers_meta_files_sorted_by_logical_name() {
    let tmp = tempdir().unwrap();
    write_file(&tmp.path().join("health/deaths.meta.yml"), "tables: {}\n");
    write_file(&tmp.path().join("demography/population.meta.yml"), "tables: {}\n");
    write_file(&tmp.path().join("health/notes.md"), "not metadata\n");

    let documents = discover_documents(tmp.path()).expect("discover ok");
    let names: Vec<_> =
        documents.iter().map(|d| d.logical_name.as_str()).collect();
    assert_eq!(names, vec!["demography/population", "health/deaths"]);
}

#[test]
fn missing_directory_is_an_error() {
    let err = discover_documents(&PathBuf::from("/nonexistent/metadata")).unwrap_err();
    assert!(matches!(err, DiscoveryError::MissingDir(_)));
}

#[test]
fn loads_and_resolves_a_document_from_disk() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("deaths.meta.yml");
    write_file(
        &path,
        "dataset:\n  title: Deaths\ntables:\n  deaths:\n    variables:\n      v:\n        title: Deaths from <<cause.lower()>>\n",
    );

    let document = load_document(&path).expect("load ok");
    let bindings = DimensionBindings::from_pairs([("cause", "Malaria")]);
    let resolved = resolve(&document, &bindings).expect("resolve ok");
    assert_eq!(
        resolved.get("tables.deaths.variables.v.title").unwrap().as_str(),
        Some("Deaths from malaria")
    );
}

#[test]
fn invalid_yaml_is_a_parse_error() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("broken.meta.yml");
    write_file(&path, "tables: [unclosed\n");

    let err = load_document(&path).unwrap_err();
    assert!(matches!(err, LoaderError::Parse { .. }));
}

#[test]
fn non_mapping_root_is_a_parse_error() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("list.meta.yml");
    write_file(&path, "- just\n- a\n- list\n");

    let err = load_document(&path).unwrap_err();
    assert!(matches!(err, LoaderError::Parse { .. }));
}
