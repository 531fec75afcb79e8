use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegionError {
    #[error("Missing {field} field in record: {line:?}")]
    MissingField { field: &'static str, line: String },

    #[error("Error parsing {field} position in record: {line:?}")]
    InvalidCoordinate { field: &'static str, line: String },

    #[error("End ({end}) is before start ({start}) in record: {line:?}")]
    InvertedInterval { start: u64, end: u64, line: String },

    #[error("Malformed record on line {line_number}: {source}")]
    Malformed {
        line_number: usize,
        #[source]
        source: Box<RegionError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
