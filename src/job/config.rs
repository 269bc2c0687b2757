//! Recognition options carried by a job

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::JobError;

/// Output encoding selected with `-f`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[serde(rename = "ISO8859_1")]
    Iso8859_1,
    #[serde(rename = "TeX")]
    TeX,
    #[serde(rename = "HTML")]
    Html,
    #[serde(rename = "XML")]
    Xml,
    #[serde(rename = "SGML")]
    Sgml,
    #[default]
    #[serde(rename = "UTF8")]
    Utf8,
    #[serde(rename = "ASCII")]
    Ascii,
}

impl OutputFormat {
    /// Name as accepted on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iso8859_1 => "ISO8859_1",
            Self::TeX => "TeX",
            Self::Html => "HTML",
            Self::Xml => "XML",
            Self::Sgml => "SGML",
            Self::Utf8 => "UTF8",
            Self::Ascii => "ASCII",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Names are case sensitive, matching the engine's own parser
        match s {
            "ISO8859_1" => Ok(Self::Iso8859_1),
            "TeX" => Ok(Self::TeX),
            "HTML" => Ok(Self::Html),
            "XML" => Ok(Self::Xml),
            "SGML" => Ok(Self::Sgml),
            "UTF8" => Ok(Self::Utf8),
            "ASCII" => Ok(Self::Ascii),
            other => Err(JobError::InvalidConfig(format!(
                "unknown output format: {}",
                other
            ))),
        }
    }
}

/// Recognition configuration block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Character database path, including the final slash
    pub db_path: PathBuf,
    pub out_format: OutputFormat,
    /// Restrict recognition to this list of characters (debugging)
    pub char_list: Option<String>,
    /// Character filter, e.g. `0-9A-Fx`
    pub char_filter: Option<String>,
    /// Remove clusters smaller than this, -1 = autodetect
    pub dust_size: i32,
    /// Grey level threshold 0..=255, 0 = autodetect
    pub grey_level: i32,
    /// Space width in dots, 0 = autodetect
    pub space_width: i32,
    pub verbose: u32,
    /// Operation mode bit pattern
    pub mode: u32,
    pub only_numbers: bool,
    /// Certainty in percent
    pub certainty: u8,
    /// Emitted for every unrecognized character
    pub unrecognized_marker: String,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./db/"),
            out_format: OutputFormat::default(),
            char_list: None,
            char_filter: None,
            dust_size: -1,
            grey_level: 0,
            space_width: 0,
            verbose: 0,
            mode: 0,
            only_numbers: false,
            certainty: 95,
            unrecognized_marker: "_".to_string(),
        }
    }
}

impl JobConfig {
    /// Mode bit 2 asks the engine to load the character database
    pub fn loads_database(&self) -> bool {
        self.mode & 2 != 0
    }

    pub fn validate(&self) -> Result<(), JobError> {
        if !(0..=255).contains(&self.grey_level) {
            return Err(JobError::InvalidConfig(format!(
                "grey level must be within 0..=255, got {}",
                self.grey_level
            )));
        }
        if self.certainty > 100 {
            return Err(JobError::InvalidConfig(format!(
                "certainty must be within 0..=100, got {}",
                self.certainty
            )));
        }
        Ok(())
    }
}
