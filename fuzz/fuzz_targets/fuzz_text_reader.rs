#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

use mzspeclib::text::{TextReader, TextWriter};

fuzz_target!(|data: &[u8]| {
    // Malformed input must produce an error, never a panic
    let Ok(mut reader) = TextReader::new(Cursor::new(data)) else {
        return;
    };

    let mut writer = TextWriter::new(Vec::new());
    if writer.write_header(reader.header()).is_err() {
        return;
    }
    // Bound the work per input
    for _ in 0..100 {
        match reader.next_spectrum() {
            Ok(Some(spectrum)) => {
                let _ = writer.write_spectrum(&spectrum);
            }
            Ok(None) | Err(_) => break,
        }
    }

    // Whatever parsed must parse again after writing
    if let Ok(bytes) = writer.finish() {
        if let Ok(reparsed) = TextReader::new(Cursor::new(bytes)) {
            let _ = reparsed.read_library();
        }
    }
});
