use std::io::{BufRead, Write};

use crate::errors::RegionError;
use crate::models::Region;

///
/// Sum `end - start` over every record of a region list.
///
/// Blank lines are ignored. Any other line that does not parse as a region
/// fails the whole sum with its 1-based line number.
///
/// # Arguments
/// - reader: the merged, autosomal region list
pub fn surveyed_length<R: BufRead>(reader: R) -> Result<u64, RegionError> {
    let mut total: u64 = 0;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        let region: Region = line.parse().map_err(|e| RegionError::Malformed {
            line_number: idx + 1,
            source: Box::new(e),
        })?;
        total += region.width();
    }

    Ok(total)
}

///
/// Write a surveyed length as a single decimal line.
///
pub fn write_surveyed_length<W: Write>(writer: &mut W, total: u64) -> std::io::Result<()> {
    writeln!(writer, "{}", total)
}
