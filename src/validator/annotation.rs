//! Peak annotation checking.
//!
//! Annotations are stored as opaque strings; the validator asks an
//! [`AnnotationParser`] whether each one is well formed. [`MzPafChecker`]
//! is a syntactic checker for the common mzPAF forms:
//!
//! ```text
//! [&][analyte@]ion[neutral losses][isotope][adduct][^charge][/mass error][*confidence]
//! ```
//!
//! e.g. `y10/3.7ppm`, `2@b5-H2O^2/-0.4ppm`, `p-[Phospho]^3`, `m3:6`, `IY`, `?`.

use std::iter::Peekable;
use std::str::CharIndices;

/// Annotation that failed to parse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid peak annotation {annotation:?} at offset {offset}: {reason}")]
pub struct AnnotationParseError {
    /// The offending annotation
    pub annotation: String,
    /// Byte offset of the failure
    pub offset: usize,
    /// What was expected
    pub reason: String,
}

/// Kind of ion an annotation names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IonKind {
    /// `?`
    Unknown,
    /// Backbone fragment such as `b5` or `z.3`
    Series {
        /// Series letter(s)
        series: String,
        /// Fragment ordinal
        ordinal: u32,
    },
    /// `mS:E` internal fragment
    Internal {
        /// First residue
        start: u32,
        /// Last residue
        end: u32,
    },
    /// `I` followed by a residue
    Immonium(String),
    /// `p`
    Precursor,
    /// `r[...]` reference ion
    Reference(String),
    /// `f{...}` chemical formula
    Formula(String),
    /// `_{...}` named compound
    Named(String),
    /// `s{...}` SMILES
    Smiles(String),
}

/// Structured view of one peak annotation
#[derive(Debug, Clone, PartialEq)]
pub struct PeakAnnotation {
    /// Whether the annotation is auxiliary (`&` prefix)
    pub auxiliary: bool,
    /// Analyte reference (`N@`)
    pub analyte: Option<String>,
    /// Ion type
    pub ion: IonKind,
    /// Neutral gains and losses, with their sign
    pub neutral_losses: Vec<String>,
    /// Isotope offset
    pub isotope: i32,
    /// Adduct description without brackets
    pub adduct: Option<String>,
    /// Charge, 1 when absent
    pub charge: u32,
    /// Mass error with unit, e.g. `3.7ppm`
    pub mass_error: Option<String>,
    /// Confidence score
    pub confidence: Option<f64>,
}

/// Parser for peak annotation strings
pub trait AnnotationParser {
    /// Parse one annotation
    fn parse(&self, annotation: &str) -> Result<PeakAnnotation, AnnotationParseError>;
}

/// Syntactic mzPAF checker
#[derive(Debug, Clone, Copy, Default)]
pub struct MzPafChecker;

impl AnnotationParser for MzPafChecker {
    fn parse(&self, annotation: &str) -> Result<PeakAnnotation, AnnotationParseError> {
        Scanner::new(annotation).annotation()
    }
}

/// Parser that accepts every annotation
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl AnnotationParser for AcceptAll {
    fn parse(&self, _annotation: &str) -> Result<PeakAnnotation, AnnotationParseError> {
        Ok(PeakAnnotation {
            auxiliary: false,
            analyte: None,
            ion: IonKind::Unknown,
            neutral_losses: Vec::new(),
            isotope: 0,
            adduct: None,
            charge: 1,
            mass_error: None,
            confidence: None,
        })
    }
}

struct Scanner<'a> {
    text: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().peekable(),
        }
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.text.len(), |(i, _)| *i)
    }

    fn fail<T>(&mut self, reason: impl Into<String>) -> Result<T, AnnotationParseError> {
        Err(AnnotationParseError {
            annotation: self.text.to_string(),
            offset: self.offset(),
            reason: reason.into(),
        })
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> &'a str {
        let start = self.offset();
        while self.peek().is_some_and(&predicate) {
            self.chars.next();
        }
        let end = self.offset();
        &self.text[start..end]
    }

    fn number(&mut self, what: &str) -> Result<u32, AnnotationParseError> {
        let digits = self.take_while(|c| c.is_ascii_digit());
        match digits.parse() {
            Ok(n) => Ok(n),
            Err(_) => self.fail(format!("expected {}", what)),
        }
    }

    fn decimal(&mut self) -> &'a str {
        let start = self.offset();
        if matches!(self.peek(), Some('-' | '+')) {
            self.chars.next();
        }
        self.take_while(|c| c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E');
        let end = self.offset();
        &self.text[start..end]
    }

    /// Contents up to the matching `close`, consuming both delimiters
    fn delimited(&mut self, open: char, close: char) -> Result<&'a str, AnnotationParseError> {
        if !self.eat(open) {
            return self.fail(format!("expected '{}'", open));
        }
        let start = self.offset();
        let mut depth = 1;
        while let Some((i, c)) = self.chars.next() {
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(&self.text[start..i]);
                }
            }
        }
        self.fail(format!("unclosed '{}'", open))
    }

    fn annotation(mut self) -> Result<PeakAnnotation, AnnotationParseError> {
        if self.text.is_empty() {
            return self.fail("empty annotation");
        }
        let auxiliary = self.eat('&');

        let analyte = if self.peek().is_some_and(|c| c.is_ascii_digit()) {
            let id = self.take_while(|c| c.is_ascii_digit());
            if !self.eat('@') {
                return self.fail("expected '@' after analyte reference");
            }
            Some(id.to_string())
        } else {
            None
        };

        let ion = self.ion()?;
        let mut annotation = PeakAnnotation {
            auxiliary,
            analyte,
            ion,
            neutral_losses: Vec::new(),
            isotope: 0,
            adduct: None,
            charge: 1,
            mass_error: None,
            confidence: None,
        };
        if annotation.ion == IonKind::Unknown {
            self.tail(&mut annotation)?;
            return Ok(annotation);
        }

        // Neutral losses and isotopes both start with a sign
        while let Some(sign @ ('-' | '+')) = self.peek() {
            self.chars.next();
            if self.peek().is_some_and(|c| c.is_ascii_digit()) || self.peek() == Some('i') {
                let count = self.take_while(|c| c.is_ascii_digit());
                if self.eat('i') {
                    let count: i32 = if count.is_empty() { 1 } else { count.parse().unwrap_or(1) };
                    annotation.isotope += if sign == '-' { -count } else { count };
                    // optional averaged/specific marker
                    self.eat('A');
                    self.eat('S');
                    continue;
                }
                // numeric mass loss such as -17.03
                let rest = self.take_while(|c| c.is_ascii_digit() || c == '.');
                annotation
                    .neutral_losses
                    .push(format!("{}{}{}", sign, count, rest));
                continue;
            }
            let loss = match self.peek() {
                Some('[') => format!("[{}]", self.delimited('[', ']')?),
                Some(c) if c.is_ascii_uppercase() => self
                    .take_while(|c| c.is_ascii_alphanumeric())
                    .to_string(),
                _ => return self.fail("expected a neutral loss or isotope"),
            };
            annotation.neutral_losses.push(format!("{}{}", sign, loss));
        }

        if self.peek() == Some('[') {
            annotation.adduct = Some(self.delimited('[', ']')?.to_string());
        }
        self.tail(&mut annotation)?;
        Ok(annotation)
    }

    fn ion(&mut self) -> Result<IonKind, AnnotationParseError> {
        let Some(c) = self.peek() else {
            return self.fail("expected an ion");
        };
        let ion = match c {
            '?' => {
                self.chars.next();
                IonKind::Unknown
            }
            'a' | 'b' | 'c' | 'x' | 'y' | 'z' => {
                self.chars.next();
                let mut series = c.to_string();
                if self.eat('.') {
                    series.push('.');
                }
                let ordinal = self.number("a fragment ordinal")?;
                IonKind::Series { series, ordinal }
            }
            'm' => {
                self.chars.next();
                let start = self.number("an internal fragment start")?;
                if !self.eat(':') {
                    return self.fail("expected ':' in internal fragment");
                }
                let end = self.number("an internal fragment end")?;
                IonKind::Internal { start, end }
            }
            'I' => {
                self.chars.next();
                let residue = self.take_while(|c| c.is_ascii_uppercase());
                if residue.is_empty() {
                    return self.fail("expected an immonium residue");
                }
                let mut residue = residue.to_string();
                if self.peek() == Some('[') {
                    residue.push_str(&format!("[{}]", self.delimited('[', ']')?));
                }
                IonKind::Immonium(residue)
            }
            'p' => {
                self.chars.next();
                IonKind::Precursor
            }
            'r' => {
                self.chars.next();
                IonKind::Reference(self.delimited('[', ']')?.to_string())
            }
            'f' => {
                self.chars.next();
                IonKind::Formula(self.delimited('{', '}')?.to_string())
            }
            '_' => {
                self.chars.next();
                IonKind::Named(self.delimited('{', '}')?.to_string())
            }
            's' => {
                self.chars.next();
                IonKind::Smiles(self.delimited('{', '}')?.to_string())
            }
            _ => return self.fail("unknown ion type"),
        };
        Ok(ion)
    }

    /// `^charge`, `/mass error` and `*confidence`, then end of input
    fn tail(&mut self, annotation: &mut PeakAnnotation) -> Result<(), AnnotationParseError> {
        if self.eat('^') {
            annotation.charge = self.number("a charge")?;
        }
        if self.eat('/') {
            let value = self.decimal();
            if value.parse::<f64>().is_err() {
                return self.fail("expected a mass error");
            }
            let at = self.offset();
            let unit = if self.text[at..].starts_with("ppm") {
                for _ in 0..3 {
                    self.chars.next();
                }
                "ppm"
            } else {
                ""
            };
            annotation.mass_error = Some(format!("{}{}", value, unit));
        }
        if self.eat('*') {
            let value = self.decimal();
            match value.parse::<f64>() {
                Ok(confidence) => annotation.confidence = Some(confidence),
                Err(_) => return self.fail("expected a confidence"),
            }
        }
        if self.peek().is_some() {
            return self.fail("unexpected trailing text");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<PeakAnnotation, AnnotationParseError> {
        MzPafChecker.parse(text)
    }

    #[test]
    fn test_series_with_mass_error() {
        let annotation = parse("y10/3.7ppm").unwrap();
        assert_eq!(
            annotation.ion,
            IonKind::Series {
                series: "y".to_string(),
                ordinal: 10
            }
        );
        assert_eq!(annotation.mass_error.as_deref(), Some("3.7ppm"));
        assert_eq!(annotation.charge, 1);
    }

    #[test]
    fn test_full_form() {
        let annotation = parse("&2@b5-H2O+i[M+Na]^2/-0.4ppm*0.75").unwrap();
        assert!(annotation.auxiliary);
        assert_eq!(annotation.analyte.as_deref(), Some("2"));
        assert_eq!(annotation.neutral_losses, vec!["-H2O"]);
        assert_eq!(annotation.isotope, 1);
        assert_eq!(annotation.adduct.as_deref(), Some("M+Na"));
        assert_eq!(annotation.charge, 2);
        assert_eq!(annotation.mass_error.as_deref(), Some("-0.4ppm"));
        assert_eq!(annotation.confidence, Some(0.75));
    }

    #[test]
    fn test_other_ion_kinds() {
        assert_eq!(parse("p-[Phospho]^3").unwrap().ion, IonKind::Precursor);
        assert_eq!(
            parse("m3:6").unwrap().ion,
            IonKind::Internal { start: 3, end: 6 }
        );
        assert_eq!(parse("IY").unwrap().ion, IonKind::Immonium("Y".to_string()));
        assert_eq!(
            parse("f{C13H9}/-0.55").unwrap().ion,
            IonKind::Formula("C13H9".to_string())
        );
        assert_eq!(
            parse("r[TMT127N]").unwrap().ion,
            IonKind::Reference("TMT127N".to_string())
        );
        assert_eq!(parse("?").unwrap().ion, IonKind::Unknown);
        assert_eq!(parse("y7-17.03").unwrap().neutral_losses, vec!["-17.03"]);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(parse("").is_err());
        assert!(parse("q5").is_err());
        assert!(parse("y").is_err());
        assert!(parse("y5^").is_err());
        assert!(parse("y5 extra").is_err());
        assert!(parse("2b5").is_err());
        assert!(parse("f{C2").is_err());
        let err = parse("y5/abc").unwrap_err();
        assert_eq!(err.offset, 3);
    }

    #[test]
    fn test_accept_all() {
        assert!(AcceptAll.parse("anything goes").is_ok());
    }
}
