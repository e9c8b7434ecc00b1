use ratatui::style::{Color, Modifier, Style};

/// Styles for the reply panel, rendered markdown and console notices.
#[derive(Debug, Clone)]
pub struct Theme {
    // Reply panel
    pub panel_style: Style,
    pub title_style: Style,
    pub overflow_style: Style,

    // Console output
    pub prompt_style: Style,
    pub info_style: Style,
    pub warning_style: Style,
    pub error_style: Style,

    // Markdown
    pub md_heading_1: Style,
    pub md_heading_other: Style,
    pub md_code_style: Style,
    pub md_link_style: Style,
    pub md_quote_style: Style,
    pub md_marker_style: Style,
    pub md_rule_style: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self::yellow()
    }
}

impl Theme {
    /// Yellow text on the terminal's own background.
    pub fn yellow() -> Self {
        let base = Style::default().fg(Color::Yellow);
        Theme {
            panel_style: base,
            title_style: base.add_modifier(Modifier::BOLD),
            overflow_style: base.add_modifier(Modifier::DIM),

            prompt_style: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            info_style: Style::default().fg(Color::Gray),
            warning_style: Style::default().fg(Color::LightYellow),
            error_style: Style::default().fg(Color::LightRed),

            md_heading_1: base.add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            md_heading_other: base.add_modifier(Modifier::BOLD),
            md_code_style: Style::default().fg(Color::LightCyan),
            md_link_style: Style::default()
                .fg(Color::LightBlue)
                .add_modifier(Modifier::UNDERLINED),
            md_quote_style: base.add_modifier(Modifier::ITALIC),
            md_marker_style: base.add_modifier(Modifier::BOLD),
            md_rule_style: base.add_modifier(Modifier::DIM),
        }
    }

    /// No colors at all; used when output is not a terminal.
    pub fn plain() -> Self {
        let none = Style::default();
        Theme {
            panel_style: none,
            title_style: none,
            overflow_style: none,
            prompt_style: none,
            info_style: none,
            warning_style: none,
            error_style: none,
            md_heading_1: none,
            md_heading_other: none,
            md_code_style: none,
            md_link_style: none,
            md_quote_style: none,
            md_marker_style: none,
            md_rule_style: none,
        }
    }

    pub fn md_heading_style(&self, level: u8) -> Style {
        if level <= 1 {
            self.md_heading_1
        } else {
            self.md_heading_other
        }
    }

    pub fn md_paragraph_style(&self) -> Style {
        self.panel_style
    }
}
