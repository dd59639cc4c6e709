#![no_main]

use libfuzzer_sys::fuzz_target;

use mzspeclib::validator::{AnnotationParser, MzPafChecker};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = MzPafChecker.parse(text);
    }
});
