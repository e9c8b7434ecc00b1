//! Markdown to styled ratatui lines.
//!
//! Wrapping is left to the widget that displays the lines; only tables are
//! laid out here, since their columns must line up.

mod table;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthStr;

use crate::ui::theme::Theme;
use table::TableRenderer;

const BULLET: &str = "• ";
const QUOTE_MARKER: &str = "│ ";
const CODE_INDENT: &str = "  ";
const RULE_WIDTH: usize = 40;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered(u64),
}

/// Renders `content` as markdown. Trailing blank lines are dropped.
pub fn render_markdown(content: &str, theme: &Theme) -> Vec<Line<'static>> {
    MarkdownRenderer::new(theme).render(content)
}

/// Plain text of rendered lines, one string per line.
pub fn lines_to_strings(lines: &[Line<'_>]) -> Vec<String> {
    lines
        .iter()
        .map(|line| line.spans.iter().map(|span| span.content.as_ref()).collect())
        .collect()
}

struct MarkdownRenderer<'t> {
    theme: &'t Theme,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    style_stack: Vec<Style>,
    list_stack: Vec<ListKind>,
    item_indent: usize,
    quote_depth: usize,
    code_block: Option<String>,
    link_stack: Vec<(String, String)>,
    table: Option<TableRenderer>,
}

impl<'t> MarkdownRenderer<'t> {
    fn new(theme: &'t Theme) -> Self {
        Self {
            theme,
            lines: Vec::new(),
            current: Vec::new(),
            style_stack: Vec::new(),
            list_stack: Vec::new(),
            item_indent: 0,
            quote_depth: 0,
            code_block: None,
            link_stack: Vec::new(),
            table: None,
        }
    }

    fn render(mut self, content: &str) -> Vec<Line<'static>> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_TASKLISTS);

        for event in Parser::new_ext(content, options) {
            self.handle(event);
        }

        // An unterminated fence while streaming still shows its code.
        if self.code_block.is_some() {
            self.finish_code_block();
        }
        self.flush_line();
        while self.lines.last().is_some_and(|line| line.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag_end) => self.end_tag(tag_end),
            Event::Text(text) => {
                if let Some(code) = self.code_block.as_mut() {
                    code.push_str(&text);
                } else if let Some(table) = self.table.as_mut() {
                    table.add_text(&text);
                } else {
                    if let Some((_, link_text)) = self.link_stack.last_mut() {
                        link_text.push_str(&text);
                    }
                    let style = self.current_style();
                    self.push_span(Span::styled(text.into_string(), style));
                }
            }
            Event::Code(code) => {
                if let Some(table) = self.table.as_mut() {
                    table.add_text(&code);
                } else {
                    self.push_span(Span::styled(code.into_string(), self.theme.md_code_style));
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(table) = self.table.as_mut() {
                    table.add_text(" ");
                } else {
                    self.flush_line();
                    if !self.list_stack.is_empty() {
                        self.push_span(Span::raw(" ".repeat(self.item_indent)));
                    }
                }
            }
            Event::Rule => {
                self.flush_line();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(RULE_WIDTH),
                    self.theme.md_rule_style,
                )));
                self.push_blank();
            }
            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                self.push_span(Span::styled(marker, self.theme.md_marker_style));
            }
            Event::InlineHtml(html) | Event::Html(html) => {
                let style = self.current_style();
                self.push_span(Span::styled(html.trim_end().to_string(), style));
            }
            _ => {}
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {}
            Tag::Heading { level, .. } => {
                self.flush_line();
                self.style_stack.push(self.theme.md_heading_style(level as u8));
            }
            Tag::BlockQuote(_) => {
                self.flush_line();
                self.quote_depth += 1;
                self.style_stack.push(self.theme.md_quote_style);
            }
            Tag::CodeBlock(kind) => {
                self.flush_line();
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.lines.push(Line::from(Span::styled(
                            format!("{CODE_INDENT}{lang}"),
                            self.theme.md_rule_style,
                        )));
                    }
                }
                self.code_block = Some(String::new());
            }
            Tag::List(start) => {
                self.flush_line();
                self.list_stack.push(match start {
                    Some(n) => ListKind::Ordered(n),
                    None => ListKind::Unordered,
                });
            }
            Tag::Item => {
                self.flush_line();
                let depth = self.list_stack.len().saturating_sub(1);
                let marker = match self.list_stack.last_mut() {
                    Some(ListKind::Ordered(n)) => {
                        let marker = format!("{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => BULLET.to_string(),
                };
                let indent = "  ".repeat(depth);
                self.item_indent = indent.len() + UnicodeWidthStr::width(marker.as_str());
                if !indent.is_empty() {
                    self.push_span(Span::raw(indent));
                }
                self.push_span(Span::styled(marker, self.theme.md_marker_style));
            }
            Tag::Emphasis => self.push_modifier(Modifier::ITALIC),
            Tag::Strong => self.push_modifier(Modifier::BOLD),
            Tag::Strikethrough => self.push_modifier(Modifier::CROSSED_OUT),
            Tag::Link { dest_url, .. } => {
                self.link_stack.push((dest_url.into_string(), String::new()));
                self.style_stack.push(self.theme.md_link_style);
            }
            Tag::Table(alignments) => {
                self.flush_line();
                self.table = Some(TableRenderer::new(alignments));
            }
            Tag::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.start_header();
                }
            }
            Tag::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.start_cell();
                }
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, tag_end: TagEnd) {
        match tag_end {
            TagEnd::Paragraph => {
                self.flush_line();
                if self.list_stack.is_empty() {
                    self.push_blank();
                }
            }
            TagEnd::Heading(_) => {
                self.flush_line();
                self.style_stack.pop();
                self.push_blank();
            }
            TagEnd::BlockQuote(_) => {
                self.flush_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.style_stack.pop();
                self.push_blank();
            }
            TagEnd::CodeBlock => self.finish_code_block(),
            TagEnd::List(_) => {
                self.flush_line();
                self.list_stack.pop();
                if self.list_stack.is_empty() {
                    self.push_blank();
                }
            }
            TagEnd::Item => self.flush_line(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.style_stack.pop();
            }
            TagEnd::Link => {
                self.style_stack.pop();
                if let Some((dest, text)) = self.link_stack.pop() {
                    if !dest.is_empty() && dest != text {
                        self.push_span(Span::styled(format!(" ({dest})"), self.theme.md_rule_style));
                    }
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    let text_style = self.theme.md_paragraph_style();
                    for line in table.finalize(text_style, self.theme.md_rule_style) {
                        self.lines.push(line);
                    }
                    self.push_blank();
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.end_header();
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    table.end_row();
                }
            }
            TagEnd::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.end_cell();
                }
            }
            _ => {}
        }
    }

    fn current_style(&self) -> Style {
        self.style_stack
            .last()
            .copied()
            .unwrap_or_else(|| self.theme.md_paragraph_style())
    }

    fn push_modifier(&mut self, modifier: Modifier) {
        let style = self.current_style().add_modifier(modifier);
        self.style_stack.push(style);
    }

    fn push_span(&mut self, span: Span<'static>) {
        self.current.push(span);
    }

    fn quote_prefix(&self) -> Option<Span<'static>> {
        (self.quote_depth > 0)
            .then(|| Span::styled(QUOTE_MARKER.repeat(self.quote_depth), self.theme.md_quote_style))
    }

    fn flush_line(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let mut spans = Vec::with_capacity(self.current.len() + 1);
        spans.extend(self.quote_prefix());
        spans.append(&mut self.current);
        self.lines.push(Line::from(spans));
    }

    /// Adds one empty separator line, never two in a row.
    fn push_blank(&mut self) {
        if self.lines.last().is_some_and(|line| line.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn finish_code_block(&mut self) {
        let Some(code) = self.code_block.take() else {
            return;
        };
        for code_line in code.trim_end_matches('\n').split('\n') {
            let mut spans = Vec::new();
            spans.extend(self.quote_prefix());
            spans.push(Span::styled(
                format!("{CODE_INDENT}{}", code_line.replace('\t', "    ")),
                self.theme.md_code_style,
            ));
            self.lines.push(Line::from(spans));
        }
        self.push_blank();
    }
}
