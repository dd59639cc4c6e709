use std::io::BufRead;

use super::{Entry, TextError, TextReader};
use crate::model::Spectrum;

/// Iterator over spectra in a text library
pub struct SpectrumIterator<R: BufRead> {
    pub(super) reader: TextReader<R>,
}

impl<R: BufRead> Iterator for SpectrumIterator<R> {
    type Item = Result<Spectrum, TextError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.next_spectrum() {
            Ok(Some(spectrum)) => Some(Ok(spectrum)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Iterator over spectra and clusters in a text library
pub struct EntryIterator<R: BufRead> {
    pub(super) reader: TextReader<R>,
}

impl<R: BufRead> Iterator for EntryIterator<R> {
    type Item = Result<Entry, TextError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_entry().transpose()
    }
}
