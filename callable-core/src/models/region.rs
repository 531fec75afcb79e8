use std::fmt::{self, Display};
use std::str::FromStr;

use crate::errors::RegionError;

///
/// Region struct, one record of a BED-like region list. For raw CallableLoci
/// files the status label (e.g. `CALLABLE`, `NO_COVERAGE`) lives in `rest`.
///
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub struct Region {
    pub chr: String,
    pub start: u64,
    pub end: u64,

    pub rest: Option<String>,
}

impl Region {
    ///
    /// Get length of the region
    ///
    pub fn width(&self) -> u64 {
        self.end - self.start
    }

    ///
    /// Get file string of Region
    ///
    pub fn as_string(&self) -> String {
        format!(
            "{}\t{}\t{}{}",
            self.chr,
            self.start,
            self.end,
            self.rest
                .as_deref()
                .map_or(String::new(), |s| format!("\t{}", s)),
        )
    }
}

fn parse_coordinate(field: Option<&str>, name: &'static str, line: &str) -> Result<u64, RegionError> {
    let value = field.ok_or_else(|| RegionError::MissingField {
        field: name,
        line: line.to_string(),
    })?;

    value.trim().parse().map_err(|_| RegionError::InvalidCoordinate {
        field: name,
        line: line.to_string(),
    })
}

impl FromStr for Region {
    type Err = RegionError;

    ///
    /// Parse one tab-separated BED line. Columns beyond the third are kept
    /// verbatim in `rest`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split('\t');

        let chr = parts
            .next()
            .filter(|chr| !chr.is_empty())
            .ok_or_else(|| RegionError::MissingField {
                field: "chromosome",
                line: line.to_string(),
            })?;
        let start = parse_coordinate(parts.next(), "start", line)?;
        let end = parse_coordinate(parts.next(), "end", line)?;

        if end < start {
            return Err(RegionError::InvertedInterval {
                start,
                end,
                line: line.to_string(),
            });
        }

        let rest = Some(parts.collect::<Vec<&str>>().join("\t")).filter(|s| !s.is_empty());

        Ok(Region {
            chr: chr.to_string(),
            start,
            end,
            rest,
        })
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}
