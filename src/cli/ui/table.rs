use std::fmt::{self, Display, Formatter};

use tabled::builder::Builder;
use tabled::settings::Style;

use super::painter::Painter;

/// A two-column field/value table rendered via `Display`.
#[derive(Debug, Default)]
pub(crate) struct FieldTable {
    rows: Vec<[String; 2]>,
}

impl FieldTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a row with a muted field name.
    pub(crate) fn row(mut self, painter: &Painter, field: impl Display, value: String) -> Self {
        self.rows.push([painter.muted(field), value]);
        self
    }
}

impl Display for FieldTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut builder = Builder::default();
        builder.push_record(["field", "value"]);
        for row in &self.rows {
            builder.push_record(row.clone());
        }
        let mut table = builder.build();
        table.with(Style::rounded());
        write!(f, "{table}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_table_renders_every_row() {
        let painter = Painter::new(false);
        let rendered = FieldTable::new()
            .row(&painter, "weight", "72.45".into())
            .row(&painter, "impedance", "512".into())
            .to_string();

        assert!(rendered.contains("field"));
        assert!(rendered.contains("weight"));
        assert!(rendered.contains("72.45"));
        assert!(rendered.contains("impedance"));
        assert!(rendered.starts_with('╭'));
    }

    #[test]
    fn header_only_table_still_renders() {
        let rendered = FieldTable::new().to_string();
        assert!(rendered.contains("value"));
    }
}
