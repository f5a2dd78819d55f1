use comfy_table::{Attribute, Cell, CellAlignment, Color, Table};

use crate::document::{Align, DocumentView};

fn alignment(align: Align) -> CellAlignment {
    match align {
        Align::Left => CellAlignment::Left,
        Align::Center => CellAlignment::Center,
        Align::Right => CellAlignment::Right,
    }
}

/// Terminal rendering of the document's line-item table plus its total row.
pub fn items_table(view: &DocumentView) -> Table {
    let columns = &view.table.columns;

    let mut table = Table::new();
    table.set_header(
        columns
            .iter()
            .map(|c| Cell::new(c.header).add_attribute(Attribute::Bold)),
    );

    for row in &view.table.rows {
        table.add_row(
            row.iter()
                .zip(columns)
                .map(|(value, c)| Cell::new(value).set_alignment(alignment(c.align))),
        );
    }

    let mut total_row: Vec<Cell> = (0..columns.len().saturating_sub(2))
        .map(|_| Cell::new(""))
        .collect();
    total_row.push(
        Cell::new(view.table.total_label)
            .add_attribute(Attribute::Bold)
            .fg(Color::Rgb { r: 37, g: 99, b: 235 }),
    );
    total_row.push(
        Cell::new(&view.table.total)
            .add_attribute(Attribute::Bold)
            .set_alignment(CellAlignment::Right),
    );
    table.add_row(total_row);
    table
}

/// Header lines printed above the table by `invoice-editor show`.
pub fn summary_lines(view: &DocumentView) -> Vec<String> {
    let mut lines = vec![
        format!("{} {}", view.issue_date.label, view.issue_date.value),
        view.recipient.clone(),
    ];
    if let Some(registration) = &view.registration {
        lines.push(registration.clone());
    }
    lines.push(format!("{} {}", view.total_due.heading, view.total_due.amount));
    lines
}
