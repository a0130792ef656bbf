use std::io::Write;

use crate::timing::TimingRecord;
use crate::Result;

/// Output format of the result record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Format {
    /// `strategy,ranks,machines,n,total,comm,comp` with six decimals on timings.
    #[default]
    Csv,
    /// The same fields as a single JSON object.
    Json,
}

/// Writes the one record of a run, followed by a newline, and flushes.
///
/// * `record`: Final timings of the run.
/// * `format`: Record format.
/// * `out`: Destination, usually stdout of the root rank.
pub fn emit<W: Write>(record: &TimingRecord, format: Format, mut out: W) -> Result<()> {
    match format {
        Format::Csv => writeln!(out, "{record}")?,
        Format::Json => {
            serde_json::to_writer(&mut out, record)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}
