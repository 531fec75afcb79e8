//! Line filters for CallableLoci region lists.
//!
//! Both filters look at the whole raw line rather than a parsed column. The callable filter keeps
//! any line containing `CALLABLE`; the autosomal filter drops any line containing one of `X`, `Y`,
//! `M` or `T`. This is a character-class match, so `chrMT` and `chrY` are dropped because of their
//! letters, and `chr1` survives because it has none of them. Output is byte-for-byte what
//! `grep 'CALLABLE'` and `sed '/[XYMT]/d'` produce on newline-terminated input.
//!
use std::fmt::{self, Display};
use std::io::{self, BufRead, Write};

/// Status label marking a callable record.
pub const CALLABLE_STATUS: &[u8] = b"CALLABLE";

/// Characters whose presence marks a record as non-autosomal.
pub const NON_AUTOSOMAL_CHARS: &[u8] = b"XYMT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFilter {
    /// Keep lines containing `CALLABLE`.
    Callable,
    /// Drop lines containing any of `X`, `Y`, `M`, `T`.
    Autosomal,
}

impl LineFilter {
    ///
    /// Decide whether a raw line (without its trailing newline) is kept.
    ///
    pub fn keeps(&self, line: &[u8]) -> bool {
        match self {
            LineFilter::Callable => is_callable(line),
            LineFilter::Autosomal => is_autosomal(line),
        }
    }
}

impl Display for LineFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineFilter::Callable => write!(f, "callable"),
            LineFilter::Autosomal => write!(f, "autosomal"),
        }
    }
}

pub fn is_callable(line: &[u8]) -> bool {
    line.windows(CALLABLE_STATUS.len())
        .any(|window| window == CALLABLE_STATUS)
}

pub fn is_autosomal(line: &[u8]) -> bool {
    !line.iter().any(|b| NON_AUTOSOMAL_CHARS.contains(b))
}

/// Line counts from a single filter pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterStats {
    pub seen: usize,
    pub kept: usize,
}

///
/// Stream a region list through a [LineFilter], writing kept lines to `writer`.
///
/// Every kept line is written with a trailing newline, even when the last input
/// line lacks one.
///
/// # Arguments
/// - reader: the region list to read
/// - writer: destination for kept lines
/// - filter: which policy to apply
pub fn filter_region_list<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    filter: LineFilter,
) -> io::Result<FilterStats> {
    let mut stats = FilterStats::default();

    for line in reader.split(b'\n') {
        let line = line?;
        stats.seen += 1;

        if filter.keeps(&line) {
            writer.write_all(&line)?;
            writer.write_all(b"\n")?;
            stats.kept += 1;
        }
    }

    Ok(stats)
}
