//! Random-access index tests against files on disk

use mzspeclib::index::{index_path_for, IndexConfig, IndexError, IndexedLibrary, LibraryIndex};
use mzspeclib::json;
use mzspeclib::text::TextReader;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn copy_sample(dir: &Path) -> PathBuf {
    let source =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/sample_library.mzspeclib.txt");
    let path = dir.join("sample.mzspeclib.txt");
    fs::copy(source, &path).unwrap();
    path
}

#[test]
fn test_every_key_matches_linear_parse() {
    let dir = tempdir().unwrap();
    let text_path = copy_sample(dir.path());
    let linear = TextReader::open(&text_path).unwrap().read_library().unwrap();

    let json_path = dir.path().join("sample.mzspeclib.json");
    json::write_library(fs::File::create(&json_path).unwrap(), &linear, false).unwrap();

    for path in [&text_path, &json_path] {
        let library = IndexedLibrary::open(path).unwrap();
        assert_eq!(library.len(), linear.spectra.len());
        assert_eq!(library.header(), &linear.header);
        for spectrum in &linear.spectra {
            assert_eq!(&library.get_spectrum(spectrum.key).unwrap(), spectrum);
        }
        assert_eq!(library.get_cluster(1).unwrap(), linear.clusters[0]);
        assert!(matches!(
            library.get_spectrum(99),
            Err(IndexError::NotFound(_))
        ));
        assert!(index_path_for(path).exists());
    }
}

#[test]
fn test_stale_index_is_rebuilt() {
    let dir = tempdir().unwrap();
    let path = copy_sample(dir.path());
    let index = LibraryIndex::load_or_build(&path, &IndexConfig::default()).unwrap();
    assert_eq!(index.len(), 2);

    let mut contents = fs::read_to_string(&path).unwrap();
    contents.push_str("<Spectrum=3>\nMS:1003061|library spectrum name=EXTRA/1\n<Peaks>\n100.0\t1.0\t?\n");
    fs::write(&path, contents).unwrap();
    assert!(index.is_stale(&path).unwrap());

    let library = IndexedLibrary::open(&path).unwrap();
    assert_eq!(library.len(), 3);
    assert_eq!(library.get_spectrum(3).unwrap().name(), Some("EXTRA/1"));
}

#[test]
fn test_edited_side_file_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = copy_sample(dir.path());
    let index = LibraryIndex::build(&path).unwrap();
    let index_path = index_path_for(&path);
    index.save(&index_path).unwrap();
    assert_eq!(LibraryIndex::load(&index_path).unwrap(), index);

    let edited = fs::read_to_string(&index_path).unwrap().replacen("\"key\":1", "\"key\":7", 1);
    fs::write(&index_path, edited).unwrap();
    assert!(matches!(
        LibraryIndex::load(&index_path),
        Err(IndexError::CorruptIndex { .. })
    ));
}
