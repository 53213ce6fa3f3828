use super::error::CliError;
use espfit::{ConditionReport, WeightSummary};
use prettytable::*;
use std::io::Write;

pub struct RunSummary<'a> {
    pub key: &'a str,
    pub source_name: &'a str,
    pub unknowns: usize,
    pub weights: WeightSummary,
    pub condition: &'a ConditionReport,
}

fn box_format() -> format::TableFormat {
    format::FormatBuilder::new()
        .column_separator('│')
        .borders('│')
        .separators(
            &[format::LinePosition::Top],
            format::LineSeparator::new('─', '┬', '╭', '╮'),
        )
        .separators(
            &[format::LinePosition::Bottom],
            format::LineSeparator::new('─', '┴', '╰', '╯'),
        )
        .padding(1, 1)
        .build()
}

pub fn write_summary(writer: &mut dyn Write, summary: &RunSummary) -> Result<(), CliError> {
    let sci = |v: f64| format!("{:12.5e}", v);

    let mut title_table = Table::new();
    title_table.set_format(box_format());
    title_table.add_row(row![bc->format!("ESP Cost Function: {}", summary.key)]);
    title_table.print(writer)?;

    let mut table = Table::new();
    table.set_format(box_format());
    table.add_row(row![b->"Source File:", summary.source_name]);
    table.add_row(row![b->"Number of unknowns:", r->summary.unknowns]);
    table.add_row(row![b->"Number of grid points:", r->summary.weights.npoint]);
    table.add_row(row![b->"Used number of grid points:", r->summary.weights.used_points]);
    table.add_row(row![b->"Lowest weight:", r->sci(summary.weights.min)]);
    table.add_row(row![b->"Highest weight:", r->sci(summary.weights.max)]);
    table.add_row(row![b->"Lowest abs eigenvalue:", r->sci(summary.condition.min_abs)]);
    table.add_row(row![b->"Highest abs eigenvalue:", r->sci(summary.condition.max_abs)]);
    table.add_row(row![b->"Condition number:", r->sci(summary.condition.condition_number)]);
    table.print(writer)?;
    writeln!(writer)?;

    Ok(())
}
