use std::io::{self, Write};

use log::warn;

use crate::attributes::{Attribute, AttributeManager, Value};
use crate::controlled_vocabulary::ms_terms;
use crate::model::{Cluster, EntityType, Library, LibraryHeader, Peak, Spectrum};

/// Writer configuration
#[derive(Debug, Clone, Default)]
pub struct TextWriterConfig {
    /// Write the attributes of a sole interpretation member directly under its
    /// interpretation instead of in an `<InterpretationMember>` section.
    ///
    /// Reading such output merges the member into the interpretation.
    pub compact_interpretations: bool,
}

/// Writer for the mzSpecLib text format
pub struct TextWriter<W: Write> {
    writer: W,
    config: TextWriterConfig,
    spectra_written: usize,
}

impl<W: Write> TextWriter<W> {
    /// Create a writer with the default configuration
    pub fn new(writer: W) -> Self {
        Self::with_config(writer, TextWriterConfig::default())
    }

    /// Create a writer with a custom configuration
    pub fn with_config(writer: W, config: TextWriterConfig) -> Self {
        Self {
            writer,
            config,
            spectra_written: 0,
        }
    }

    /// Write the `<mzSpecLib>` header, library attributes and attribute sets
    pub fn write_header(&mut self, header: &LibraryHeader) -> io::Result<()> {
        writeln!(self.writer, "<mzSpecLib>")?;
        self.write_attributes(header.attributes.iter())?;
        for entity_type in EntityType::ALL {
            for set in header.attribute_sets.sets_for(entity_type) {
                writeln!(self.writer, "<AttributeSet {}={}>", entity_type, set.name)?;
                self.write_attributes(set.attributes.iter())?;
                writeln!(self.writer)?;
            }
        }
        Ok(())
    }

    /// Write one spectrum section
    pub fn write_spectrum(&mut self, spectrum: &Spectrum) -> io::Result<()> {
        writeln!(self.writer, "<Spectrum={}>", spectrum.key)?;
        self.write_local(&spectrum.attributes)?;

        for analyte in &spectrum.analytes {
            writeln!(self.writer, "<Analyte={}>", analyte.id)?;
            self.write_local(&analyte.attributes)?;
        }

        let compact = self.config.compact_interpretations && spectrum.interpretations.len() == 1;
        for interpretation in &spectrum.interpretations {
            writeln!(self.writer, "<Interpretation={}>", interpretation.id)?;
            self.write_local(&interpretation.attributes)?;
            if compact && interpretation.members.len() == 1 {
                for member in &interpretation.members {
                    self.write_local(&member.attributes)?;
                }
                continue;
            }
            for member in &interpretation.members {
                writeln!(self.writer, "<InterpretationMember={}>", member.id)?;
                self.write_local(&member.attributes)?;
            }
        }

        writeln!(self.writer, "<Peaks>")?;
        for peak in &spectrum.peaks {
            self.write_peak(peak)?;
        }
        writeln!(self.writer)?;
        self.spectra_written += 1;
        Ok(())
    }

    /// Write one cluster section
    pub fn write_cluster(&mut self, cluster: &Cluster) -> io::Result<()> {
        writeln!(self.writer, "<Cluster={}>", cluster.key)?;
        if !cluster.members.is_empty() {
            let members = Attribute::new(ms_terms::cluster_member_keys(), cluster.members_value());
            writeln!(self.writer, "{}", members)?;
        }
        self.write_local(&cluster.attributes)?;
        writeln!(self.writer)
    }

    /// Write a complete library: header, spectra, then clusters
    pub fn write_library(&mut self, library: &Library) -> io::Result<()> {
        self.write_header(&library.header)?;
        for spectrum in &library.spectra {
            self.write_spectrum(spectrum)?;
        }
        for cluster in &library.clusters {
            self.write_cluster(cluster)?;
        }
        Ok(())
    }

    /// Number of spectra written so far
    pub fn spectra_written(&self) -> usize {
        self.spectra_written
    }

    /// Flush and return the underlying writer
    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn write_local(&mut self, attributes: &AttributeManager) -> io::Result<()> {
        self.write_attributes(attributes.local())
    }

    /// Write attribute lines.
    ///
    /// A list value becomes one line per element, all in the list's group. An
    /// ungrouped list gets a group id above every group of the entity, which
    /// the reader drops again when it folds the lines back into a list.
    fn write_attributes<'a>(
        &mut self,
        attributes: impl Iterator<Item = &'a Attribute>,
    ) -> io::Result<()> {
        let attributes: Vec<&Attribute> = attributes.collect();
        let mut next_group = attributes
            .iter()
            .filter_map(|a| a.group)
            .max()
            .map_or(1, |g| g + 1);

        for attribute in attributes {
            let Value::List(items) = &attribute.value else {
                writeln!(self.writer, "{}", attribute)?;
                continue;
            };
            match items.as_slice() {
                [] => warn!(
                    "Skipping empty list value of {} in text output",
                    attribute.term
                ),
                [only] => {
                    let line = Attribute {
                        value: only.clone(),
                        ..attribute.clone()
                    };
                    writeln!(self.writer, "{}", line)?;
                }
                items => {
                    let group = attribute.group.unwrap_or_else(|| {
                        next_group += 1;
                        next_group - 1
                    });
                    for item in items {
                        let line = Attribute::new(attribute.term.clone(), item.clone())
                            .with_group(group);
                        writeln!(self.writer, "{}", line)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn write_peak(&mut self, peak: &Peak) -> io::Result<()> {
        let annotations = if peak.annotations.is_empty() {
            "?".to_string()
        } else {
            peak.annotations.join(",")
        };
        write!(
            self.writer,
            "{}\t{}\t{}",
            Value::Float(peak.mz).format_text(),
            Value::Float(peak.intensity).format_text(),
            annotations
        )?;
        for aggregation in &peak.aggregations {
            write!(self.writer, "\t{}", aggregation.format_text())?;
        }
        writeln!(self.writer)
    }
}

/// Render a single spectrum section as a string
pub fn format_spectrum(spectrum: &Spectrum) -> io::Result<String> {
    let mut writer = TextWriter::new(Vec::new());
    writer.write_spectrum(spectrum)?;
    let bytes = writer.finish()?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
