//! The titled panel a reply streams into.

use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Position, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::{Terminal, TerminalOptions, Viewport};
use std::io::{self, Stdout};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::ui::markdown::render_markdown;
use crate::ui::theme::Theme;
use crate::ui::title::truncate_to_width;

const OVERFLOW_MARKER: &str = "…";

/// Receives the growing reply text of one turn.
pub trait ReplyView {
    fn begin(&mut self, title: &str) -> io::Result<()>;
    fn update(&mut self, text: &str) -> io::Result<()>;
    /// Final render of the complete text; the view may release the screen.
    fn finish(&mut self, text: &str) -> io::Result<()>;
}

/// Draws the panel onto any ratatui backend.
pub struct PanelView<B: Backend> {
    terminal: Terminal<B>,
    theme: Theme,
    title: String,
}

impl<B: Backend> PanelView<B> {
    pub fn new(terminal: Terminal<B>, theme: Theme) -> Self {
        Self {
            terminal,
            theme,
            title: String::new(),
        }
    }

    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }

    /// Draws `text` and returns the area actually covered.
    fn draw(&mut self, text: &str) -> io::Result<Rect> {
        let theme = &self.theme;
        let title = &self.title;
        let mut used = Rect::default();
        self.terminal.draw(|frame| {
            let area = frame.area();
            if area.height == 0 || area.width == 0 {
                return;
            }
            let width = usize::from(area.width);

            let title_line = Line::from(Span::styled(
                truncate_to_width(title, width),
                theme.title_style,
            ));
            frame.render_widget(
                Paragraph::new(title_line),
                Rect {
                    height: 1,
                    ..area
                },
            );

            let body_height = usize::from(area.height - 1);
            let rows = wrap_lines(&render_markdown(text, theme), width);
            let visible = fit_rows(rows, body_height, theme.overflow_style);
            let body = Rect {
                y: area.y + 1,
                height: visible.len() as u16,
                ..area
            };
            used = Rect {
                height: 1 + body.height,
                ..area
            };
            frame.render_widget(Paragraph::new(visible).style(theme.panel_style), body);
        })?;
        Ok(used)
    }
}

impl<B: Backend> ReplyView for PanelView<B> {
    fn begin(&mut self, title: &str) -> io::Result<()> {
        self.title = title.to_string();
        self.terminal.clear()?;
        self.draw("").map(|_| ())
    }

    fn update(&mut self, text: &str) -> io::Result<()> {
        self.draw(text).map(|_| ())
    }

    fn finish(&mut self, text: &str) -> io::Result<()> {
        let used = self.draw(text)?;
        self.terminal
            .set_cursor_position(Position::new(0, used.y + used.height))?;
        self.terminal.show_cursor()
    }
}

/// Opens an inline viewport under the prompt for each reply and releases it
/// when the reply is finished.
pub struct InlinePanel {
    theme: Theme,
    active: Option<PanelView<CrosstermBackend<Stdout>>>,
}

impl InlinePanel {
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            active: None,
        }
    }

    fn viewport_height() -> u16 {
        let rows = ratatui::crossterm::terminal::size()
            .map(|(_, rows)| rows)
            .unwrap_or(24);
        rows.saturating_sub(1).max(2)
    }
}

impl ReplyView for InlinePanel {
    fn begin(&mut self, title: &str) -> io::Result<()> {
        let terminal = Terminal::with_options(
            CrosstermBackend::new(io::stdout()),
            TerminalOptions {
                viewport: Viewport::Inline(Self::viewport_height()),
            },
        )?;
        let mut view = PanelView::new(terminal, self.theme.clone());
        view.title = title.to_string();
        view.draw("")?;
        self.active = Some(view);
        Ok(())
    }

    fn update(&mut self, text: &str) -> io::Result<()> {
        match self.active.as_mut() {
            Some(view) => view.update(text),
            None => Ok(()),
        }
    }

    fn finish(&mut self, text: &str) -> io::Result<()> {
        match self.active.take() {
            Some(mut view) => view.finish(text),
            None => Ok(()),
        }
    }
}

/// Keeps the first rows that fit; when some are cut the last visible row is
/// an ellipsis.
fn fit_rows(mut rows: Vec<Line<'static>>, height: usize, overflow: Style) -> Vec<Line<'static>> {
    if rows.len() <= height {
        return rows;
    }
    if height == 0 {
        return Vec::new();
    }
    rows.truncate(height - 1);
    rows.push(Line::from(Span::styled(OVERFLOW_MARKER, overflow)));
    rows
}

/// Greedy word wrap to `width` columns. Words wider than a row are split
/// between graphemes; whitespace at a row break is dropped.
pub fn wrap_lines(lines: &[Line<'static>], width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut rows = Vec::new();
    for line in lines {
        let mut row: Vec<Span<'static>> = Vec::new();
        let mut row_width = 0;

        for span in &line.spans {
            for word in span.content.split_word_bounds() {
                let word_width = UnicodeWidthStr::width(word);
                let is_space = word.chars().all(char::is_whitespace);

                if row_width + word_width <= width {
                    row.push(Span::styled(word.to_string(), span.style));
                    row_width += word_width;
                    continue;
                }
                if is_space {
                    break_row(&mut rows, &mut row);
                    row_width = 0;
                    continue;
                }
                if word_width <= width && row_width > 0 {
                    break_row(&mut rows, &mut row);
                    row.push(Span::styled(word.to_string(), span.style));
                    row_width = word_width;
                    continue;
                }
                for grapheme in word.graphemes(true) {
                    let grapheme_width = UnicodeWidthStr::width(grapheme);
                    if row_width + grapheme_width > width && row_width > 0 {
                        break_row(&mut rows, &mut row);
                        row_width = 0;
                    }
                    row.push(Span::styled(grapheme.to_string(), span.style));
                    row_width += grapheme_width;
                }
            }
        }
        rows.push(Line::from(row));
    }
    rows
}

fn break_row(rows: &mut Vec<Line<'static>>, row: &mut Vec<Span<'static>>) {
    while row
        .last()
        .is_some_and(|span| !span.content.is_empty() && span.content.trim().is_empty())
    {
        row.pop();
    }
    rows.push(Line::from(std::mem::take(row)));
}
