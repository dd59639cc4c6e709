use super::*;
use crate::controlled_vocabulary::{accessions, unit_terms};
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use rusqlite::params;
use std::io::Write;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

const DIANN_TSV: &str = "transition_group_id\tPrecursorMz\tPrecursorCharge\tFullUniModPeptideName\tPeptideSequence\tProductMz\tLibraryIntensity\tFragmentType\tFragmentSeriesNumber\tFragmentCharge\tFragmentLossType\tUniprotID\tProteinName\tProteotypic\tdecoy
AAC(UniMod:4)K2\t300.5\t2\tAAC(UniMod:4)K\tAACK\t400.2\t1.0\ty\t3\t1\tnoloss\tP12345\tPROT_HUMAN\t1\t0
AAC(UniMod:4)K2\t300.5\t2\tAAC(UniMod:4)K\tAACK\t200.1\t0.5\tb\t2\t2\tH2O\tP12345\tPROT_HUMAN\t1\t0
PEPTIDEK3\t310.8\t3\tPEPTIDEK\tPEPTIDEK\t500.3\t1.0\ty\t4\t1\tnoloss\tP99999\tOTHER_HUMAN\t0\t1
";

const SPECTRONAUT_TSV: &str = "ReferenceRun\tPrecursorCharge\tIntModifiedPeptide\tModifiedPeptide\tStrippedPeptide\tiRT\tIonMobility\tCV\tUniProtIds\tProtein Name\tIsProteotypic\tLabeledPeptide\tPrecursorMz\tFragmentLossType\tFragmentNumber\tFragmentType\tFragmentCharge\tFragmentMz\tRelativeIntensity
run_1\t2\t_PEPM[+16]K_\t_PEPM[Oxidation (M)]K_\tPEPMK\t12.5\t0.9\t-45\tP12345\tPROT\tTrue\t_PEPM[Oxidation (M)]K_\t310.15\tnoloss\t2\ty\t1\t262.1\t100
run_1\t2\t_PEPM[+16]K_\t_PEPM[Oxidation (M)]K_\tPEPMK\t12.5\t0.9\t-45\tP12345\tPROT\tTrue\t_PEPM[Oxidation (M)]K_\t310.15\tNH3\t3\tb\t1\t330.2\t40
run_1\t3\t_PEPM[+16]K_\t_PEPM[Oxidation (M)]K_\tPEPMK\t12.5\t0.9\t-45\tP12345\tPROT\tTrue\t_PEPM[Oxidation (M)]K_\t207.1\tnoloss\t2\ty\t1\t262.1\t100
";

const MSP: &str = "Name: LESLIEK/2_0
MW: 816.4
Comment: Parent=409.2369 Mods=0 Inst=it
Num peaks: 2
147.1128\t1234.5\t\"y1/0.2ppm\"
260.1969\t2500.0\t\"?\"
";

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn zlib(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

fn create_blib(path: &Path) {
    let connection = rusqlite::Connection::open(path).unwrap();
    connection
        .execute_batch(
            "CREATE TABLE LibInfo(libLSID TEXT, createTime TEXT, numSpecs INTEGER, majorVersion INTEGER, minorVersion INTEGER);
             INSERT INTO LibInfo VALUES('urn:lsid:example.org:spectral_library:bibliospec:nr:demo', 'now', 2, 1, 10);
             CREATE TABLE RefSpectra(id INTEGER PRIMARY KEY, peptideSeq TEXT, precursorMZ REAL, precursorCharge INTEGER, peptideModSeq TEXT, copies INTEGER, numPeaks INTEGER, retentionTime REAL, fileID INTEGER, SpecIDinFile TEXT);
             CREATE TABLE RefSpectraPeaks(RefSpectraID INTEGER, peakMZ BLOB, peakIntensity BLOB);
             CREATE TABLE SpectrumSourceFiles(id INTEGER PRIMARY KEY, fileName TEXT);
             INSERT INTO SpectrumSourceFiles VALUES(1, 'run1.raw');",
        )
        .unwrap();

    let spectra: [(i64, &str, &str, f64, i64, &[f64], bool); 2] = [
        (1, "PEPCK", "PEPC[+57.0]K", 300.15, 2, &[147.1, 250.2, 350.3], true),
        (2, "LESLIEK", "LESLIEK", 409.24, 2, &[147.1128, 260.1969], false),
    ];
    for (id, seq, mod_seq, mz, charge, mzs, compress) in spectra {
        connection
            .execute(
                "INSERT INTO RefSpectra VALUES(?1, ?2, ?3, ?4, ?5, 3, ?6, 21.5, 1, 'scan=42')",
                params![id, seq, mz, charge, mod_seq, mzs.len() as i64],
            )
            .unwrap();
        let mut mz_bytes = Vec::new();
        let mut intensity_bytes = Vec::new();
        for (i, mz) in mzs.iter().enumerate() {
            mz_bytes.write_f64::<LittleEndian>(*mz).unwrap();
            intensity_bytes
                .write_f32::<LittleEndian>(100.0 * (i + 1) as f32)
                .unwrap();
        }
        if compress {
            mz_bytes = zlib(&mz_bytes);
            intensity_bytes = zlib(&intensity_bytes);
        }
        connection
            .execute(
                "INSERT INTO RefSpectraPeaks VALUES(?1, ?2, ?3)",
                params![id, mz_bytes, intensity_bytes],
            )
            .unwrap();
    }
}

fn create_dlib(path: &Path) {
    let connection = rusqlite::Connection::open(path).unwrap();
    connection
        .execute_batch(
            "CREATE TABLE metadata(Key TEXT, Value TEXT);
             INSERT INTO metadata VALUES('version', '0.1.14');
             INSERT INTO metadata VALUES('staleProteinMapping', 'true');
             CREATE TABLE entries(PrecursorMz REAL, PrecursorCharge INTEGER, PeptideModSeq TEXT, PeptideSeq TEXT, Copies INTEGER, RTInSeconds REAL, Score REAL, MassEncodedLength INTEGER, MassArray BLOB, IntensityEncodedLength INTEGER, IntensityArray BLOB, SourceFile TEXT);",
        )
        .unwrap();

    let mut masses = Vec::new();
    let mut intensities = Vec::new();
    for (mz, intensity) in [(175.119, 10.0f32), (276.166, 20.0), (389.25, 5.0)] {
        masses.write_f64::<BigEndian>(mz).unwrap();
        intensities.write_f32::<BigEndian>(intensity).unwrap();
    }
    connection
        .execute(
            "INSERT INTO entries VALUES(495.78, 2, 'PEPTM[+15.995]R', 'PEPTMR', 4, 1234.5, 0.01, ?1, ?2, ?3, ?4, 'run2.mzML')",
            params![
                masses.len() as i64,
                zlib(&masses),
                intensities.len() as i64,
                zlib(&intensities)
            ],
        )
        .unwrap();
}

#[test]
fn test_detect_format() {
    let dir = tempdir().unwrap();
    let text = write_file(&dir, "lib.mzlib.txt", "<mzSpecLib>\nMS:1003186|library format version=1.0\n");
    let json = write_file(&dir, "lib.mzlib.json", "{}");
    let msp = write_file(&dir, "lib.msp", MSP);
    let msp_no_ext = write_file(&dir, "lib.dat", MSP);
    let diann = write_file(&dir, "lib.tsv", DIANN_TSV);
    let spectronaut = write_file(&dir, "sn.xls", SPECTRONAUT_TSV);
    let unknown = write_file(&dir, "notes.txt", "hello\n");
    let blib = dir.path().join("lib.blib");
    create_blib(&blib);
    let dlib = dir.path().join("lib.dlib");
    create_dlib(&dlib);

    assert_eq!(detect_format(&text).unwrap(), Format::Text);
    assert_eq!(detect_format(&json).unwrap(), Format::Json);
    assert_eq!(detect_format(&msp).unwrap(), Format::Msp);
    assert_eq!(detect_format(&msp_no_ext).unwrap(), Format::Msp);
    assert_eq!(detect_format(&diann).unwrap(), Format::DiaNn);
    assert_eq!(detect_format(&spectronaut).unwrap(), Format::Spectronaut);
    assert_eq!(detect_format(&blib).unwrap(), Format::BiblioSpec);
    assert_eq!(detect_format(&dlib).unwrap(), Format::EncyclopeDia);
    assert!(matches!(
        detect_format(&unknown),
        Err(AdapterError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_format_names() {
    assert_eq!("dia-nn".parse::<Format>().unwrap(), Format::DiaNn);
    assert_eq!("BLIB".parse::<Format>().unwrap(), Format::BiblioSpec);
    assert_eq!(Format::EncyclopeDia.to_string(), "encyclopedia");
    assert!(Format::Json.is_native());
    assert!(!Format::Msp.is_native());
    assert!("mzml".parse::<Format>().is_err());
}

#[test]
fn test_gzipped_msp() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lib.msp.gz");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(MSP.as_bytes()).unwrap();
    std::fs::write(&path, encoder.finish().unwrap()).unwrap();

    assert_eq!(detect_format(&path).unwrap(), Format::Msp);
    let library = open_adapter(&path).unwrap().read_library().unwrap();
    assert_eq!(library.header.name(), Some("lib"));
    assert_eq!(library.spectra.len(), 1);
    let spectrum = &library.spectra[0];
    assert_eq!(spectrum.name(), Some("LESLIEK/2_0"));
    assert_eq!(
        spectrum.attributes.get_value("MS:1000044"),
        Some(&Value::Term(ms_terms::trap_cid()))
    );
    assert_eq!(spectrum.peaks[0].annotations, vec!["y1/0.2ppm"]);
}

#[test]
fn test_diann_grouping() {
    let dir = tempdir().unwrap();
    let path = write_file(&dir, "predicted.tsv", DIANN_TSV);
    let mut adapter = open_adapter(&path).unwrap();
    assert_eq!(adapter.format(), Format::DiaNn);
    let library = adapter.read_library().unwrap();

    assert_eq!(library.spectra.len(), 2);
    let first = &library.spectra[0];
    assert_eq!(first.key, 1);
    assert_eq!(first.name(), Some("AAC(UniMod:4)K2"));
    assert_eq!(first.charge(), Some(2));
    assert_eq!(first.peaks.len(), 2);
    assert_eq!(first.peaks[0].annotations, vec!["y3"]);
    assert_eq!(first.peaks[1].annotations, vec!["b2-H2O^2"]);
    assert_eq!(
        first.attributes.get_value(accessions::SPECTRUM_ORIGIN_TYPE),
        Some(&Value::Term(ms_terms::predicted_spectrum()))
    );

    let analyte = &first.analytes[0];
    assert_eq!(
        analyte
            .attributes
            .get_value(accessions::PROFORMA_ION)
            .and_then(Value::as_str),
        Some("AAC[UNIMOD:4]K/2")
    );
    let accession = analyte.attributes.get("MS:1000885").unwrap();
    let protein_name = analyte.attributes.get("MS:1000886").unwrap();
    assert!(accession.group.is_some());
    assert_eq!(accession.group, protein_name.group);
    assert_eq!(first.interpretations[0].analyte_ids, vec!["1"]);

    let second = &library.spectra[1];
    assert_eq!(second.key, 2);
    assert_eq!(
        second.attributes.get_value(accessions::SPECTRUM_ORIGIN_TYPE),
        Some(&Value::Term(ms_terms::decoy_spectrum()))
    );
    assert_eq!(
        second.attributes.get_value(accessions::SPECTRUM_AGGREGATION_TYPE),
        Some(&Value::Term(ms_terms::singleton_spectrum()))
    );
}

#[test]
fn test_diann_ambiguous_grouping() {
    let dir = tempdir().unwrap();
    let mut lines: Vec<&str> = DIANN_TSV.lines().collect();
    let repeat = lines[1];
    lines.push(repeat);
    let path = write_file(&dir, "broken.tsv", &(lines.join("\n") + "\n"));

    let mut adapter = diann::DiaNnAdapter::open(&path).unwrap();
    let results: Vec<_> = adapter.spectra().collect();
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    match &results[2] {
        Err(AdapterError::AmbiguousRecordGrouping { format, group, row }) => {
            assert_eq!(*format, Format::DiaNn);
            assert_eq!(group, "AAC(UniMod:4)K2");
            assert_eq!(*row, 4);
        }
        other => panic!("unexpected result {:?}", other.as_ref().map(|s| s.key)),
    }
}

#[test]
fn test_diann_missing_column() {
    let dir = tempdir().unwrap();
    let path = write_file(
        &dir,
        "short.tsv",
        "transition_group_id\tPrecursorMz\tPrecursorCharge\nA\t1\t2\n",
    );
    match diann::DiaNnAdapter::open(&path) {
        Err(AdapterError::Format { format, cause }) => {
            assert_eq!(format, Format::DiaNn);
            assert!(cause.contains("FullUniModPeptideName"));
        }
        _ => panic!("expected a missing column error"),
    }
}

#[test]
fn test_spectronaut_grouping() {
    let dir = tempdir().unwrap();
    let path = write_file(&dir, "sn.tsv", SPECTRONAUT_TSV);
    let library = open_adapter_as(&path, Format::Spectronaut)
        .unwrap()
        .read_library()
        .unwrap();

    assert_eq!(library.spectra.len(), 2);
    let first = &library.spectra[0];
    assert_eq!(first.name(), Some("PEPM[Oxidation (M)]K/2"));
    assert_eq!(first.peaks.len(), 2);
    assert_eq!(first.peaks[1].annotations, vec!["b3-NH3"]);
    assert_eq!(first.precursor_mz(), Some(310.15));
    assert_eq!(
        first.attributes.get_value(accessions::PRECURSOR_MZ),
        Some(&Value::Float(310.15))
    );
    assert_eq!(
        first.attributes.get_value(accessions::SPECTRUM_ORIGIN_TYPE),
        Some(&Value::Term(ms_terms::observed_spectrum()))
    );
    assert_eq!(
        first.attributes.get_value("MS:1001581"),
        Some(&Value::Float(-45.0))
    );

    let irt = first.attributes.get("MS:1000896").unwrap();
    assert_eq!(
        first.attributes.unit_of(irt).map(|u| &u.value),
        Some(&Value::Term(unit_terms::minute()))
    );
    assert_eq!(
        first.analytes[0]
            .attributes
            .get_value(accessions::PROFORMA_ION)
            .and_then(Value::as_str),
        Some("PEPM[Oxidation]K/2")
    );

    let second = &library.spectra[1];
    assert_eq!(second.key, 2);
    assert_eq!(second.charge(), Some(3));
}

#[test]
fn test_bibliospec() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("demo.blib");
    create_blib(&path);

    let mut adapter = open_adapter(&path).unwrap();
    assert_eq!(adapter.format(), Format::BiblioSpec);
    assert_eq!(adapter.header().name(), Some("demo"));
    let library = adapter.read_library().unwrap();
    assert_eq!(library.spectra.len(), 2);

    let first = &library.spectra[0];
    assert_eq!(first.key, 1);
    assert_eq!(first.name(), Some("PEPC[+57.0]K/2"));
    assert_eq!(first.peaks.len(), 3);
    assert_eq!(first.peaks[1].mz, 250.2);
    assert_eq!(first.peaks[2].intensity, 300.0);
    assert_eq!(
        first.attributes.get_value("MS:1003203").and_then(Value::as_str),
        Some("run1.raw")
    );
    let rt = first.attributes.get("MS:1000894").unwrap();
    assert_eq!(
        first.attributes.unit_of(rt).map(|u| &u.value),
        Some(&Value::Term(unit_terms::minute()))
    );

    // Uncompressed blobs are read as-is
    let second = &library.spectra[1];
    assert_eq!(second.key, 2);
    assert_eq!(second.peaks[0].mz, 147.1128);
}

#[test]
fn test_bibliospec_peak_count_mismatch() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.blib");
    create_blib(&path);
    {
        let connection = rusqlite::Connection::open(&path).unwrap();
        connection
            .execute("UPDATE RefSpectra SET numPeaks = 5 WHERE id = 2", [])
            .unwrap();
    }
    let mut adapter = bibliospec::BiblioSpecAdapter::open(&path).unwrap();
    assert_eq!(adapter.len(), 2);
    assert!(adapter.get_spectrum(1).is_ok());
    assert!(matches!(
        adapter.get_spectrum(2),
        Err(AdapterError::Format {
            format: Format::BiblioSpec,
            ..
        })
    ));
    assert!(adapter.read_library().is_err());
}

#[test]
fn test_encyclopedia() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("chrom.dlib");
    create_dlib(&path);

    let mut adapter = open_adapter(&path).unwrap();
    assert_eq!(adapter.format(), Format::EncyclopeDia);
    let header = adapter.header().clone();
    assert_eq!(
        header
            .attributes
            .get_value(accessions::LIBRARY_VERSION)
            .and_then(Value::as_str),
        Some("0.1.14")
    );

    let library = adapter.read_library().unwrap();
    assert_eq!(library.spectra.len(), 1);
    let spectrum = &library.spectra[0];
    assert_eq!(spectrum.key, 1);
    assert_eq!(spectrum.name(), Some("PEPTM[+15.995]R/2"));
    assert_eq!(spectrum.peaks.len(), 3);
    assert_eq!(spectrum.peaks[1].mz, 276.166);
    assert_eq!(spectrum.peaks[1].intensity, 20.0);
    let rt = spectrum.attributes.get("MS:1000894").unwrap();
    assert_eq!(rt.value, Value::Float(1234.5));
    assert_eq!(
        spectrum.attributes.unit_of(rt).map(|u| &u.value),
        Some(&Value::Term(unit_terms::second()))
    );
}

#[test]
fn test_native_text_keeps_clusters() {
    let dir = tempdir().unwrap();
    let path = write_file(
        &dir,
        "small.mzlib.txt",
        "<mzSpecLib>
MS:1003186|library format version=1.0
<Spectrum=4>
MS:1003061|library spectrum name=LESLIEK/2
<Peaks>
147.1\t10.0\t?

<Cluster=1>
MS:1003268|library spectrum cluster member keys=4
",
    );
    let mut adapter = open_adapter(&path).unwrap();
    assert_eq!(adapter.format(), Format::Text);
    let library = adapter.read_library().unwrap();
    assert_eq!(library.spectra.len(), 1);
    assert_eq!(library.spectra[0].key, 4);
    assert_eq!(library.clusters.len(), 1);
    assert_eq!(library.clusters[0].members, vec![4]);
}

#[test]
fn test_fragment_annotation() {
    assert_eq!(fragment_annotation("y", "7", "noloss", 1), "y7");
    assert_eq!(fragment_annotation("y", "7", "H2O", 2), "y7-H2O^2");
    assert_eq!(fragment_annotation("b", "3", "", 1), "b3");
}

#[test]
fn test_cast_value() {
    assert_eq!(cast_value("42"), Value::Int(42));
    assert_eq!(cast_value("4.5"), Value::Float(4.5));
    assert_eq!(cast_value("NaN"), Value::Str("NaN".to_string()));
    assert_eq!(cast_value(" text "), Value::Str("text".to_string()));
}

#[test]
fn test_library_name_from_path() {
    assert_eq!(library_name_from_path(Path::new("/a/b/lib.msp.gz")), "lib");
    assert_eq!(library_name_from_path(Path::new("lib.tsv")), "lib");
    assert_eq!(library_name_from_path(Path::new("plain")), "plain");
}
