//! End-to-end codec tests on the sample library
//!
//! These tests read the sample text library, move it through JSON and back,
//! and check that nothing is lost on the way.

use mzspeclib::json;
use mzspeclib::model::Library;
use mzspeclib::text::{TextReader, TextWriter};
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const SAMPLE_NAME: &str = "AAAACALTPGPLADLAAR/2_1(4,C,CAM)_46eV";

fn sample_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/sample_library.mzspeclib.txt")
}

fn read_text(path: &Path) -> Library {
    TextReader::open(path).unwrap().read_library().unwrap()
}

fn write_text(library: &Library) -> Vec<u8> {
    let mut writer = TextWriter::new(Vec::new());
    writer.write_library(library).unwrap();
    writer.finish().unwrap()
}

fn peak_triples(library: &Library, key: u64) -> Vec<(f64, f64, Vec<String>)> {
    library
        .get_spectrum(key)
        .unwrap()
        .peaks
        .iter()
        .map(|p| (p.mz, p.intensity, p.annotations.clone()))
        .collect()
}

#[test]
fn test_sample_spectrum() {
    let library = read_text(&sample_path());
    assert_eq!(library.spectra.len(), 2);
    assert_eq!(library.clusters.len(), 1);
    assert_eq!(library.header.name(), Some("chinese_hamster_hcd_selected_head"));

    let spectrum = library.get_spectrum(1).unwrap();
    assert_eq!(spectrum.name(), Some(SAMPLE_NAME));
    assert_eq!(spectrum.charge(), Some(2));
    assert_eq!(spectrum.peaks.len(), 87);
    assert_eq!(spectrum.peaks[10].annotations, vec!["y10/3.7ppm"]);
    assert_eq!(spectrum.analytes.len(), 1);

    // inherited from the Spectrum=all attribute set
    assert!(spectrum.attributes.has("MS:1003065"));
    assert_eq!(library.get_spectrum_by_name(SAMPLE_NAME).map(|s| s.key), Some(1));
    assert_eq!(library.clusters[0].members, vec![1, 2]);
}

#[test]
fn test_text_json_text_preserves_spectra() {
    let dir = tempdir().unwrap();
    let original = read_text(&sample_path());

    let json_path = dir.path().join("sample.mzspeclib.json");
    json::write_library(File::create(&json_path).unwrap(), &original, true).unwrap();
    let from_json = json::read_library(BufReader::new(File::open(&json_path).unwrap())).unwrap();
    assert_eq!(from_json, original);

    let text_path = dir.path().join("sample.mzspeclib.txt");
    std::fs::write(&text_path, write_text(&from_json)).unwrap();
    let back = read_text(&text_path);
    assert_eq!(back, original);

    let spectrum = back.get_spectrum(1).unwrap();
    assert_eq!(spectrum.key, 1);
    assert_eq!(spectrum.name(), Some(SAMPLE_NAME));
    assert_eq!(spectrum.charge(), Some(2));
    assert_eq!(peak_triples(&back, 1), peak_triples(&original, 1));
    assert_eq!(peak_triples(&back, 1).len(), 87);
}

#[test]
fn test_written_text_parses_identically() {
    let original = read_text(&sample_path());
    let first = write_text(&original);
    let reparsed = TextReader::new(Cursor::new(first.clone()))
        .unwrap()
        .read_library()
        .unwrap();
    assert_eq!(reparsed, original);
    assert_eq!(write_text(&reparsed), first);
}

#[test]
fn test_document_form_round_trip() {
    let original = read_text(&sample_path());
    let document = json::to_document(&original);
    let restored = json::from_document(document).unwrap();
    assert_eq!(restored, original);
}
