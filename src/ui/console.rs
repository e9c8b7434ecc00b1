//! Line-oriented output outside the reply panel: status lines, warnings,
//! errors and rendered markdown.

use ratatui::crossterm::queue;
use ratatui::crossterm::style::{
    Attribute, Color as CColor, Print, ResetColor, SetAttribute, SetForegroundColor,
};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use std::io::{self, IsTerminal, Stdout, Write};

use crate::ui::markdown::render_markdown;
use crate::ui::theme::Theme;

pub struct Console<W: Write> {
    out: W,
    theme: Theme,
    styled: bool,
}

impl Console<Stdout> {
    /// Colors are only emitted when stdout is a terminal.
    pub fn stdout(theme: Theme) -> Self {
        let styled = io::stdout().is_terminal();
        Console::new(io::stdout(), theme, styled)
    }
}

impl<W: Write> Console<W> {
    pub fn new(out: W, theme: Theme, styled: bool) -> Self {
        Self { out, theme, styled }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn info(&mut self, text: &str) -> io::Result<()> {
        let style = self.theme.info_style;
        self.styled_line(text, style)
    }

    pub fn warning(&mut self, text: &str) -> io::Result<()> {
        let style = self.theme.warning_style;
        self.styled_line(&format!("warning: {text}"), style)
    }

    /// Errors may carry markdown (fenced API payloads), so they are rendered.
    pub fn error(&mut self, text: &str) -> io::Result<()> {
        let theme = Theme {
            panel_style: self.theme.error_style,
            ..self.theme.clone()
        };
        let lines = render_markdown(text, &theme);
        self.write_lines(&lines)
    }

    pub fn markdown(&mut self, text: &str) -> io::Result<()> {
        let lines = render_markdown(text, &self.theme);
        self.write_lines(&lines)
    }

    /// `label` in the default style followed by `value` highlighted, e.g.
    /// `using: openai:gpt-4o-mini`.
    pub fn labelled(&mut self, label: &str, value: &str) -> io::Result<()> {
        let style = self.theme.title_style;
        self.write_styled(label, Style::default())?;
        self.write_styled(value, style)?;
        writeln!(self.out)?;
        self.out.flush()
    }

    pub fn write_lines(&mut self, lines: &[Line<'_>]) -> io::Result<()> {
        for line in lines {
            for span in &line.spans {
                self.write_styled(&span.content, line.style.patch(span.style))?;
            }
            writeln!(self.out)?;
        }
        self.out.flush()
    }

    fn styled_line(&mut self, text: &str, style: Style) -> io::Result<()> {
        for line in text.lines() {
            self.write_styled(line, style)?;
            writeln!(self.out)?;
        }
        self.out.flush()
    }

    fn write_styled(&mut self, text: &str, style: Style) -> io::Result<()> {
        if !self.styled || style == Style::default() {
            return write!(self.out, "{text}");
        }
        if let Some(fg) = style.fg {
            queue!(self.out, SetForegroundColor(to_crossterm(fg)))?;
        }
        for (modifier, attribute) in [
            (Modifier::BOLD, Attribute::Bold),
            (Modifier::DIM, Attribute::Dim),
            (Modifier::ITALIC, Attribute::Italic),
            (Modifier::UNDERLINED, Attribute::Underlined),
            (Modifier::CROSSED_OUT, Attribute::CrossedOut),
        ] {
            if style.add_modifier.contains(modifier) {
                queue!(self.out, SetAttribute(attribute))?;
            }
        }
        queue!(
            self.out,
            Print(text),
            SetAttribute(Attribute::Reset),
            ResetColor
        )
    }
}

fn to_crossterm(color: Color) -> CColor {
    match color {
        Color::Reset => CColor::Reset,
        Color::Black => CColor::Black,
        Color::Red => CColor::DarkRed,
        Color::Green => CColor::DarkGreen,
        Color::Yellow => CColor::DarkYellow,
        Color::Blue => CColor::DarkBlue,
        Color::Magenta => CColor::DarkMagenta,
        Color::Cyan => CColor::DarkCyan,
        Color::Gray => CColor::Grey,
        Color::DarkGray => CColor::DarkGrey,
        Color::LightRed => CColor::Red,
        Color::LightGreen => CColor::Green,
        Color::LightYellow => CColor::Yellow,
        Color::LightBlue => CColor::Blue,
        Color::LightMagenta => CColor::Magenta,
        Color::LightCyan => CColor::Cyan,
        Color::White => CColor::White,
        Color::Rgb(r, g, b) => CColor::Rgb { r, g, b },
        Color::Indexed(i) => CColor::AnsiValue(i),
    }
}
