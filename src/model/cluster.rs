use crate::attributes::{AttributeManager, Value};
use crate::controlled_vocabulary::accessions;

/// A group of library spectra that were clustered together
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cluster {
    /// Cluster key, unique within the library
    pub key: u64,
    /// Keys of the member spectra
    pub members: Vec<u64>,
    /// Cluster attributes, excluding the member list
    pub attributes: AttributeManager,
}

impl Cluster {
    /// Create an empty cluster
    pub fn new(key: u64) -> Self {
        Self {
            key,
            ..Default::default()
        }
    }

    /// The member list rendered as the `MS:1003268` comma-separated value
    pub fn members_value(&self) -> Value {
        Value::Str(
            self.members
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    /// Pull member keys out of `MS:1003268` attributes into `members`.
    ///
    /// Returns the first token that is not a key.
    pub fn extract_members(&mut self) -> Result<(), String> {
        for attribute in self.attributes.remove_all(accessions::CLUSTER_MEMBER_KEYS) {
            match &attribute.value {
                Value::Int(_) => self.members.push(member_key(&attribute.value)?),
                Value::List(items) => {
                    for item in items {
                        self.members.push(member_key(item)?);
                    }
                }
                Value::Str(text) => {
                    for token in text.split(',') {
                        let token = token.trim();
                        if token.is_empty() {
                            continue;
                        }
                        let key = token.parse::<u64>().map_err(|_| token.to_string())?;
                        self.members.push(key);
                    }
                }
                other => return Err(other.format_text()),
            }
        }
        Ok(())
    }
}

fn member_key(value: &Value) -> Result<u64, String> {
    value
        .as_int()
        .and_then(|k| u64::try_from(k).ok())
        .ok_or_else(|| value.format_text())
}
