//! Tab-separated results table
//!
//! One row per evaluated corpus pair. Percentages are rounded to three
//! decimals here and nowhere else.

use crate::score::MetricsReport;
use std::io::{self, Write};

/// Round to three decimal places
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Write a header line followed by one row per `(name, report)`
pub fn write_table<W: Write>(out: &mut W, rows: &[(String, MetricsReport)]) -> io::Result<()> {
    let mut header = vec!["file_name"];
    header.extend(MetricsReport::METRIC_NAMES);
    header.extend(MetricsReport::COUNT_NAMES);
    writeln!(out, "{}", header.join("\t"))?;

    for (name, report) in rows {
        let mut fields = vec![name.clone()];
        fields.extend(
            report
                .metrics()
                .iter()
                .map(|(_, value)| format!("{:.3}", round3(*value))),
        );
        fields.extend(report.counts().iter().map(|(_, count)| count.to_string()));
        writeln!(out, "{}", fields.join("\t"))?;
    }
    Ok(())
}
