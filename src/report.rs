//! Text report

use std::io;

use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    result::SessionResult,
    rows::RowLock,
    session::{Session, SessionObserver},
    solver::PackingSolver,
};

/// Errors raised while writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The output could not be written.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SessionResult {
    /// Write the summary and any unfulfilled demand as text.
    ///
    /// # Errors
    ///
    /// Returns a [`ReportError`] if the output cannot be written.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), ReportError> {
        if !self.unfulfilled().is_empty() {
            let mut builder = Builder::default();

            builder.push_record(["Unplaced item", "Left", "Requested"]);

            for entry in self.unfulfilled() {
                builder.push_record([
                    entry.display_name().to_string(),
                    entry.leftover_count.to_string(),
                    entry.requested_total.to_string(),
                ]);
            }

            write_table(&mut out, builder, 1..3)?;
        }

        let lines = [
            (
                "Placed",
                format!("{} / {}", self.placed_count(), self.total_demand()),
            ),
            ("Fill rate", format!("{}%", self.fill_rate_percent())),
            (
                "Volume used",
                format!("{}%", self.volume_utilization_percent()),
            ),
            ("Free volume", format!("{} m³", self.free_volume_m3())),
            ("Unplaced", self.unfulfilled_count().to_string()),
        ];

        let label_width = lines.iter().map(|(label, _)| label.len()).max().unwrap_or(0);

        for (label, value) in lines {
            writeln!(out, " {label:<label_width$}  {value}")?;
        }

        writeln!(out)?;

        Ok(())
    }
}

impl<S: PackingSolver, O: SessionObserver> Session<S, O> {
    /// Write the rows table followed by the result summary.
    ///
    /// # Errors
    ///
    /// Returns a [`ReportError`] if the output cannot be written.
    pub fn write_report(&self, mut out: impl io::Write) -> Result<(), ReportError> {
        let mut builder = Builder::default();

        builder.push_record(["", "Item", "Size", "Count", "Pending", "Commit", "Color"]);

        for (index, (key, row)) in self.rows().entries().enumerate() {
            let [width, height, depth] = row.dimensions();
            let state = match row.lock() {
                RowLock::Unlocked => "",
                RowLock::Locked(_) => "locked",
                RowLock::Released(_) => "released",
            };

            builder.push_record([
                format!("#{:<3}", index + 1),
                row.name().to_string(),
                format!("{width} × {height} × {depth} {}", row.unit()),
                row.count().to_string(),
                self.pending_count(key).unwrap_or_default().to_string(),
                state.to_string(),
                row.color().to_string(),
            ]);
        }

        write_table(&mut out, builder, 3..5)?;

        self.result().write_to(out)
    }
}

fn write_table(
    out: &mut impl io::Write,
    builder: Builder,
    numeric: std::ops::Range<usize>,
) -> Result<(), ReportError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(
        1,
        HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤')),
    );

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(numeric), Alignment::right());

    writeln!(out, "\n{table}")?;

    Ok(())
}
