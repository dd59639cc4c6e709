use super::*;
use crate::text::TextReader;
use std::fs;
use tempfile::tempdir;

const LIBRARY_TEXT: &str = "<mzSpecLib>
MS:1003186|library format version=1.0
<AttributeSet Spectrum=all>
MS:1000044|dissociation method=MS:1000422|beam-type collision-induced dissociation

<Spectrum=10>
MS:1003061|library spectrum name=LESLIEK/2
<Analyte=1>
MS:1000041|charge state=2
<Peaks>
147.1128\t1234.5\ty1/0.2ppm
260.1969\t2500.0\ty2/-0.4ppm

<Spectrum=20>
MS:1003061|library spectrum name=PEPTIDE/3
<Peaks>
100.0\t10.0\t?

<Cluster=1>
MS:1003268|library spectrum cluster member keys=10,20

<Spectrum=30>
MS:1003061|library spectrum name=ELVIS/1
<Peaks>
200.0\t5.0\t?
";

fn write_source(dir: &Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn json_source(dir: &Path) -> std::path::PathBuf {
    let library = TextReader::new(LIBRARY_TEXT.as_bytes())
        .unwrap()
        .read_library()
        .unwrap();
    let mut bytes = Vec::new();
    json::write_library(&mut bytes, &library, true).unwrap();
    write_source(dir, "library.mzlib.json", &bytes)
}

fn assert_index_matches_linear_parse(path: &Path) {
    let index = LibraryIndex::build(path).unwrap();
    let library = IndexedLibrary::with_index(path, index).unwrap();
    let linear = match library.index().format() {
        LibraryFormat::Text => TextReader::open(path).unwrap().read_library().unwrap(),
        LibraryFormat::Json => json::read_library(File::open(path).unwrap()).unwrap(),
    };

    assert_eq!(library.len(), 3);
    for spectrum in &linear.spectra {
        assert_eq!(&library.get_spectrum(spectrum.key).unwrap(), spectrum);
    }
    for cluster in &linear.clusters {
        assert_eq!(&library.get_cluster(cluster.key).unwrap(), cluster);
    }
}

#[test]
fn test_text_index_matches_linear_parse() {
    let dir = tempdir().unwrap();
    let path = write_source(dir.path(), "library.mzlib.txt", LIBRARY_TEXT.as_bytes());
    assert_index_matches_linear_parse(&path);
}

#[test]
fn test_json_index_matches_linear_parse() {
    let dir = tempdir().unwrap();
    let path = json_source(dir.path());
    assert_index_matches_linear_parse(&path);
}

#[test]
fn test_lookups() {
    let dir = tempdir().unwrap();
    let path = write_source(dir.path(), "library.mzlib.txt", LIBRARY_TEXT.as_bytes());
    let index = LibraryIndex::build(&path).unwrap();

    assert_eq!(index.format(), LibraryFormat::Text);
    assert_eq!(index.lookup_key(20).unwrap(), index.lookup_index(1).unwrap());
    assert_eq!(
        index.lookup_name("ELVIS/1").unwrap(),
        index.lookup_key(30).unwrap()
    );
    assert!(index.lookup_cluster(1).is_ok());
    assert!(matches!(
        index.lookup_key(99),
        Err(IndexError::NotFound(IndexQuery::Key(99)))
    ));
    assert!(index.lookup_index(3).is_err());

    let keys: Vec<u64> = index.iter().map(|e| e.key).collect();
    assert_eq!(keys, vec![10, 20, 30]);

    let bytes = LIBRARY_TEXT.as_bytes();
    let range = index.lookup_key(20).unwrap();
    let section = std::str::from_utf8(&bytes[range.start as usize..range.end as usize]).unwrap();
    assert!(section.starts_with("<Spectrum=20>"));
    assert!(!section.contains("<Cluster"));
}

#[test]
fn test_get_by_index_and_name() {
    let dir = tempdir().unwrap();
    let path = write_source(dir.path(), "library.mzlib.txt", LIBRARY_TEXT.as_bytes());
    let library = IndexedLibrary::open(&path).unwrap();

    let spectrum = library.get_spectrum_by_index(2).unwrap();
    assert_eq!(spectrum.key, 30);
    assert_eq!(spectrum.index, 2);
    let spectrum = library.get_spectrum_by_name("LESLIEK/2").unwrap();
    assert_eq!(spectrum.key, 10);
    assert_eq!(spectrum.charge(), Some(2));
    assert!(spectrum.attributes.has("MS:1000044"));
}

#[test]
fn test_save_and_load() {
    let dir = tempdir().unwrap();
    let path = write_source(dir.path(), "library.mzlib.txt", LIBRARY_TEXT.as_bytes());
    let index = LibraryIndex::build(&path).unwrap();
    let index_path = index_path_for(&path);
    assert!(index_path.to_string_lossy().ends_with("library.mzlib.txt.index.json"));

    index.save(&index_path).unwrap();
    let loaded = LibraryIndex::load(&index_path).unwrap();
    assert_eq!(loaded, index);
    assert_eq!(loaded.created(), index.created());
}

#[test]
fn test_corrupt_index() {
    let dir = tempdir().unwrap();
    let path = write_source(dir.path(), "library.mzlib.txt", LIBRARY_TEXT.as_bytes());
    let index = LibraryIndex::build(&path).unwrap();
    let index_path = index_path_for(&path);
    index.save(&index_path).unwrap();

    let edited = fs::read_to_string(&index_path)
        .unwrap()
        .replace("\"key\":20", "\"key\":21");
    fs::write(&index_path, edited).unwrap();
    assert!(matches!(
        LibraryIndex::load(&index_path),
        Err(IndexError::CorruptIndex { .. })
    ));

    fs::write(&index_path, "not json").unwrap();
    assert!(matches!(
        LibraryIndex::load(&index_path),
        Err(IndexError::CorruptIndex { .. })
    ));

    // A corrupt side file is replaced
    let rebuilt = LibraryIndex::load_or_build(&path, &IndexConfig::default()).unwrap();
    assert_eq!(rebuilt, index);
    assert!(LibraryIndex::load(&index_path).is_ok());
}

#[test]
fn test_staleness() {
    let dir = tempdir().unwrap();
    let path = write_source(dir.path(), "library.mzlib.txt", LIBRARY_TEXT.as_bytes());
    let index = LibraryIndex::load_or_build(&path, &IndexConfig::default()).unwrap();
    assert!(!index.is_stale(&path).unwrap());

    let mut changed = LIBRARY_TEXT.to_string();
    changed.push_str("\n<Spectrum=40>\n<Peaks>\n1.0\t1.0\t?\n");
    fs::write(&path, changed).unwrap();
    assert!(index.is_stale(&path).unwrap());

    let keep = IndexConfig {
        rebuild_if_stale: false,
    };
    assert_eq!(LibraryIndex::load_or_build(&path, &keep).unwrap().len(), 3);
    assert_eq!(
        LibraryIndex::load_or_build(&path, &IndexConfig::default())
            .unwrap()
            .len(),
        4
    );
}

#[test]
fn test_detect_by_content() {
    let dir = tempdir().unwrap();
    let text = write_source(dir.path(), "library.lib", LIBRARY_TEXT.as_bytes());
    assert_eq!(LibraryFormat::detect(&text).unwrap(), LibraryFormat::Text);
    let json = write_source(dir.path(), "library.lib2", b"  {\"spectra\": []}");
    assert_eq!(LibraryFormat::detect(&json).unwrap(), LibraryFormat::Json);
    let other = write_source(dir.path(), "library.bin", b"\x00\x01");
    assert!(matches!(
        LibraryFormat::detect(&other),
        Err(IndexError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_json_missing_key() {
    let dir = tempdir().unwrap();
    let path = write_source(
        dir.path(),
        "broken.mzlib.json",
        br#"{"spectra": [{"attributes": []}]}"#,
    );
    assert!(matches!(
        LibraryIndex::build(&path),
        Err(IndexError::Json(JsonError::MissingField { .. }))
    ));
}

#[test]
fn test_indexed_library_is_sync() {
    fn assert_sync<T: Send + Sync>() {}
    assert_sync::<IndexedLibrary>();
}

#[cfg(feature = "parallel")]
#[test]
fn test_get_many() {
    let dir = tempdir().unwrap();
    let path = write_source(dir.path(), "library.mzlib.txt", LIBRARY_TEXT.as_bytes());
    let library = IndexedLibrary::open(&path).unwrap();

    let results = library.get_many(&[30, 10, 99]);
    assert_eq!(results[0].as_ref().unwrap().key, 30);
    assert_eq!(results[1].as_ref().unwrap().key, 10);
    assert!(matches!(results[2], Err(IndexError::NotFound(_))));
}
