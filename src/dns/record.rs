//! DNS records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    /// Alias to another hostname.
    #[serde(rename = "CNAME")]
    Cname,
    /// IPv4 address.
    A,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cname => f.write_str("CNAME"),
            Self::A => f.write_str("A"),
        }
    }
}

/// A single record contributed by a source object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Record {
    /// Fully qualified name, dot-terminated.
    pub fqdn: String,
    /// Record type.
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Target hostname or address.
    pub value: String,
}

impl Record {
    /// A CNAME record.
    #[must_use]
    pub fn cname(fqdn: &str, value: impl Into<String>) -> Self {
        Self {
            fqdn: ensure_dot_suffix(fqdn),
            record_type: RecordType::Cname,
            value: value.into(),
        }
    }

    /// An A record.
    #[must_use]
    pub fn a(fqdn: &str, value: impl Into<String>) -> Self {
        Self {
            fqdn: ensure_dot_suffix(fqdn),
            record_type: RecordType::A,
            value: value.into(),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.fqdn, self.record_type, self.value)
    }
}

/// Appends a trailing dot if missing.
#[must_use]
pub fn ensure_dot_suffix(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

/// Drops every A record if any CNAME is present.
#[must_use]
pub fn prefer_cnames(records: Vec<Record>) -> Vec<Record> {
    if records.iter().any(|r| r.record_type == RecordType::Cname) {
        records
            .into_iter()
            .filter(|r| r.record_type == RecordType::Cname)
            .collect()
    } else {
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_suffix() {
        assert_eq!(ensure_dot_suffix("foo.example.com"), "foo.example.com.");
        assert_eq!(ensure_dot_suffix("foo.example.com."), "foo.example.com.");
    }

    #[test]
    fn test_cname_wins_over_a() {
        let records = vec![
            Record::a("foo.example.com", "1.2.3.4"),
            Record::cname("foo.example.com", "lb.example.com"),
        ];
        assert_eq!(
            prefer_cnames(records),
            vec![Record::cname("foo.example.com", "lb.example.com")]
        );
    }

    #[test]
    fn test_a_records_kept_without_cname() {
        let records = vec![Record::a("foo.example.com", "1.2.3.4")];
        assert_eq!(prefer_cnames(records.clone()), records);
    }

    #[test]
    fn test_serializes_type_name() {
        let yaml = serde_yaml::to_string(&Record::cname("foo.example.com", "lb")).unwrap();
        assert!(yaml.contains("type: CNAME"));
    }
}
