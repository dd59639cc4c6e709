use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mzspeclib::index::IndexedLibrary;
use mzspeclib::json;
use mzspeclib::text::{TextReader, TextWriter};
use std::fmt::Write as _;
use std::io::Cursor;
use tempfile::TempDir;

/// Generate a synthetic text library
fn generate_text_library(num_spectra: usize, peaks_per_spectrum: usize) -> String {
    let mut content = String::from(
        "<mzSpecLib>\n\
         MS:1003186|library format version=1.0\n\
         MS:1003188|library name=bench\n\
         <AttributeSet Spectrum=all>\n\
         MS:1003065|spectrum aggregation type=MS:1003066|singleton spectrum\n\n",
    );
    for i in 0..num_spectra {
        let charge = 2 + i % 3;
        let _ = write!(
            content,
            "<Spectrum={key}>\n\
             MS:1003061|library spectrum name=PEPTIDE{i}/{charge}\n\
             MS:1003208|experimental precursor monoisotopic m/z={mz:.4}\n\
             MS:1000041|charge state={charge}\n\
             [1]MS:1000894|retention time={rt:.2}\n\
             [1]UO:0000000|unit=UO:0000010|second\n\
             <Analyte=1>\n\
             MS:1003270|proforma peptidoform ion notation=PEPTIDE{i}/{charge}\n\
             <Peaks>\n",
            key = i + 1,
            i = i,
            charge = charge,
            mz = 400.0 + i as f64 * 0.37,
            rt = i as f64 * 0.5,
        );
        for j in 0..peaks_per_spectrum {
            let _ = writeln!(
                content,
                "{:.4}\t{:.1}\ty{}/{:.1}ppm",
                150.0 + j as f64 * 7.25,
                1000.0 + (j * 37 % 500) as f64,
                j + 1,
                (j % 7) as f64 - 3.0
            );
        }
        content.push('\n');
    }
    content
}

/// Benchmark streaming text parsing
fn bench_text_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_parsing");

    for num_spectra in [100, 1000] {
        let peaks_per_spectrum = 50;
        let content = generate_text_library(num_spectra, peaks_per_spectrum);

        group.throughput(Throughput::Bytes(content.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}spectra_{}peaks", num_spectra, peaks_per_spectrum)),
            &content,
            |b, content| {
                b.iter(|| {
                    let reader = TextReader::new(Cursor::new(content.as_bytes())).unwrap();
                    let count = reader.spectra().filter(|s| s.is_ok()).count();
                    assert_eq!(count, num_spectra);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark text to JSON conversion of a parsed library
fn bench_json_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("json_roundtrip");
    let content = generate_text_library(500, 50);
    let library = TextReader::new(Cursor::new(content.as_bytes()))
        .unwrap()
        .read_library()
        .unwrap();

    group.bench_function("write_json", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            json::write_library(&mut out, &library, false).unwrap();
            out
        });
    });

    let mut encoded = Vec::new();
    json::write_library(&mut encoded, &library, false).unwrap();
    group.bench_function("read_json", |b| {
        b.iter(|| json::read_library(Cursor::new(&encoded)).unwrap());
    });

    group.bench_function("write_text", |b| {
        b.iter(|| {
            let mut writer = TextWriter::new(Vec::new());
            writer.write_library(&library).unwrap();
            writer.finish().unwrap()
        });
    });

    group.finish();
}

/// Benchmark point lookups through a built index
fn bench_indexed_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexed_lookup");
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bench.mzlib.txt");
    std::fs::write(&path, generate_text_library(2000, 50)).unwrap();
    let library = IndexedLibrary::open(&path).unwrap();

    group.bench_function("get_spectrum", |b| {
        let mut key = 0u64;
        b.iter(|| {
            key = key % 2000 + 1;
            library.get_spectrum(key).unwrap()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_text_parsing,
    bench_json_roundtrip,
    bench_indexed_lookup
);
criterion_main!(benches);
