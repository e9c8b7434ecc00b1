use pulldown_cmark::Alignment;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthStr;

const COLUMN_SEPARATOR: &str = " │ ";

/// Collects markdown table events and lays the cells out in aligned columns.
pub(crate) struct TableRenderer {
    alignments: Vec<Alignment>,
    header: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
    current_row: Vec<String>,
    current_cell: String,
    in_header: bool,
}

impl TableRenderer {
    pub(crate) fn new(alignments: Vec<Alignment>) -> Self {
        Self {
            alignments,
            header: None,
            rows: Vec::new(),
            current_row: Vec::new(),
            current_cell: String::new(),
            in_header: false,
        }
    }

    pub(crate) fn start_header(&mut self) {
        self.in_header = true;
    }

    // Header cells arrive directly under the head, without a row.
    pub(crate) fn end_header(&mut self) {
        self.in_header = false;
        self.header = Some(std::mem::take(&mut self.current_row));
    }

    pub(crate) fn end_row(&mut self) {
        if !self.in_header {
            self.rows.push(std::mem::take(&mut self.current_row));
        }
    }

    pub(crate) fn start_cell(&mut self) {
        self.current_cell.clear();
    }

    pub(crate) fn end_cell(&mut self) {
        let cell = self.current_cell.trim().to_string();
        self.current_row.push(cell);
    }

    pub(crate) fn add_text(&mut self, text: &str) {
        self.current_cell.push_str(text);
    }

    fn column_widths(&self) -> Vec<usize> {
        let columns = self
            .header
            .iter()
            .chain(self.rows.iter())
            .map(Vec::len)
            .max()
            .unwrap_or(0);
        let mut widths = vec![0; columns];
        for row in self.header.iter().chain(self.rows.iter()) {
            for (index, cell) in row.iter().enumerate() {
                widths[index] = widths[index].max(UnicodeWidthStr::width(cell.as_str()));
            }
        }
        widths
    }

    fn pad(&self, cell: &str, column: usize, width: usize) -> String {
        let gap = width.saturating_sub(UnicodeWidthStr::width(cell));
        match self.alignments.get(column).copied().unwrap_or(Alignment::None) {
            Alignment::Right => format!("{}{cell}", " ".repeat(gap)),
            Alignment::Center => {
                let left = gap / 2;
                format!("{}{cell}{}", " ".repeat(left), " ".repeat(gap - left))
            }
            Alignment::Left | Alignment::None => format!("{cell}{}", " ".repeat(gap)),
        }
    }

    fn row_line(&self, row: &[String], widths: &[usize], style: Style, border: Style) -> Line<'static> {
        let mut spans = Vec::new();
        for (column, width) in widths.iter().enumerate() {
            if column > 0 {
                spans.push(Span::styled(COLUMN_SEPARATOR, border));
            }
            let cell = row.get(column).map(String::as_str).unwrap_or("");
            spans.push(Span::styled(self.pad(cell, column, *width), style));
        }
        Line::from(spans)
    }

    pub(crate) fn finalize(self, text_style: Style, border_style: Style) -> Vec<Line<'static>> {
        let widths = self.column_widths();
        let mut lines = Vec::new();
        if let Some(header) = &self.header {
            let header_style = text_style.add_modifier(Modifier::BOLD);
            lines.push(self.row_line(header, &widths, header_style, border_style));
            let rule = widths
                .iter()
                .map(|width| "─".repeat(*width))
                .collect::<Vec<_>>()
                .join("─┼─");
            lines.push(Line::from(Span::styled(rule, border_style)));
        }
        for row in &self.rows {
            lines.push(self.row_line(row, &widths, text_style, border_style));
        }
        lines
    }
}
