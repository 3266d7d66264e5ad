use std::fmt;
use std::str::FromStr;

use crate::bail;
use crate::error::{ErrorKind, IngestError};
use crate::types::{Payload, Record};

/// Header fields addressable by a [`FieldPath`]. `uid` is deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    Name,
    Topic,
    DataType,
    CreatedAt,
    TagCode,
    TagValues,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSection {
    Data,
    Metadata,
    AffiliatedData,
}

impl PayloadSection {
    fn payload<'a>(&self, record: &'a Record) -> &'a Payload {
        match self {
            PayloadSection::Data => &record.data,
            PayloadSection::Metadata => &record.metadata,
            PayloadSection::AffiliatedData => &record.affiliated_data,
        }
    }

    fn payload_mut<'a>(&self, record: &'a mut Record) -> &'a mut Payload {
        match self {
            PayloadSection::Data => &mut record.data,
            PayloadSection::Metadata => &mut record.metadata,
            PayloadSection::AffiliatedData => &mut record.affiliated_data,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            PayloadSection::Data => "data",
            PayloadSection::Metadata => "metadata",
            PayloadSection::AffiliatedData => "affiliated_data",
        }
    }
}

/// Address of a single field of a [`Record`], used to merge parallel stage outputs.
///
/// Parsed from `data.x`, `metadata.x`, `affiliated_data.x`, one of the header names (`name`,
/// `topic`, `data_type`, `created_at`, `tag_code`, `tag_values`) or a bare `x`, which means
/// `data.x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPath {
    Header(HeaderField),
    Payload { section: PayloadSection, key: String },
}

impl FieldPath {
    /// Copies the field from `from` into `to`.
    ///
    /// A payload key missing on `from` is removed from `to`.
    pub fn copy(&self, from: &Record, to: &mut Record) {
        match self {
            FieldPath::Header(header) => match header {
                HeaderField::Name => to.name.clone_from(&from.name),
                HeaderField::Topic => to.topic.clone_from(&from.topic),
                HeaderField::DataType => to.data_type.clone_from(&from.data_type),
                HeaderField::CreatedAt => to.created_at.clone_from(&from.created_at),
                HeaderField::TagCode => to.tag_code.clone_from(&from.tag_code),
                HeaderField::TagValues => to.tag_values.clone_from(&from.tag_values),
            },
            FieldPath::Payload { section, key } => {
                match section.payload(from).get(key) {
                    Some(value) => {
                        section.payload_mut(to).insert(key.clone(), value.clone());
                    }
                    None => {
                        section.payload_mut(to).remove(key);
                    }
                }
            }
        }
    }
}

impl FromStr for FieldPath {
    type Err = IngestError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let (section, key) = match path.split_once('.') {
            Some((section, key)) => {
                let section = match section {
                    "data" => PayloadSection::Data,
                    "metadata" => PayloadSection::Metadata,
                    "affiliated_data" => PayloadSection::AffiliatedData,
                    _ => bail!(ErrorKind::ConfigError, "Unknown field path section", path),
                };
                (section, key)
            }
            None => {
                let header = match path {
                    "name" => Some(HeaderField::Name),
                    "topic" => Some(HeaderField::Topic),
                    "data_type" => Some(HeaderField::DataType),
                    "created_at" => Some(HeaderField::CreatedAt),
                    "tag_code" => Some(HeaderField::TagCode),
                    "tag_values" => Some(HeaderField::TagValues),
                    "uid" => bail!(
                        ErrorKind::ConfigError,
                        "The uid of a record cannot be an owned field"
                    ),
                    _ => None,
                };

                if let Some(header) = header {
                    return Ok(FieldPath::Header(header));
                }

                (PayloadSection::Data, path)
            }
        };

        if key.is_empty() || key.contains('.') {
            bail!(ErrorKind::ConfigError, "Invalid field path", path);
        }

        Ok(FieldPath::Payload {
            section,
            key: key.to_string(),
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::Header(header) => {
                let name = match header {
                    HeaderField::Name => "name",
                    HeaderField::Topic => "topic",
                    HeaderField::DataType => "data_type",
                    HeaderField::CreatedAt => "created_at",
                    HeaderField::TagCode => "tag_code",
                    HeaderField::TagValues => "tag_values",
                };
                f.write_str(name)
            }
            FieldPath::Payload { section, key } => write!(f, "{}.{key}", section.as_str()),
        }
    }
}
