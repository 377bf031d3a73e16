use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Row, Table};
use tsd::ParsingStatistics;

pub struct Formatter {}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter {
    pub fn new() -> Self {
        Self {}
    }

    pub fn format_statistics(&self, stats: &ParsingStatistics) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(Row::from(vec![
            Cell::new("Declarations").set_alignment(CellAlignment::Left),
            Cell::new("Count").set_alignment(CellAlignment::Right),
        ]));

        let rows = [
            ("Types", stats.types),
            ("Actions", stats.actions),
            ("Rules", stats.rules),
            ("Facts", stats.facts),
            ("Fact assignments", stats.fact_assignments),
            ("Removals", stats.removals),
            ("Xuple spaces", stats.xuple_spaces),
            ("Files parsed", stats.files_parsed),
            ("Errors", stats.errors),
        ];
        for (label, count) in rows {
            table.add_row(Row::from(vec![
                Cell::new(label),
                Cell::new(count).set_alignment(CellAlignment::Right),
            ]));
        }

        format!("{}\n", table)
    }
}
