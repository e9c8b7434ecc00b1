//! Classification of prompt input into control commands and chat text.

mod registry;

pub use registry::{all_commands, find_command, CommandEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Blank input; re-prompt.
    Empty,
    Quit,
    ListModels,
    NewChat,
    Help,
    /// Prompts for a model name.
    ChangeModel,
    /// Switches to the named provider, or prompts for one.
    ChangeProvider(Option<String>),
    /// Text for the model, exactly as typed.
    Chat(String),
}

impl Command {
    pub fn is_chat(&self) -> bool {
        matches!(self, Command::Chat(_))
    }
}

/// Classifies one input line. Command words are matched on the trimmed,
/// lowercased line; only commands that take an argument accept a second
/// word. Anything else is chat.
pub fn classify(input: &str) -> Command {
    let normalized = input.trim().to_lowercase();
    if normalized.is_empty() {
        return Command::Empty;
    }

    let mut words = normalized.split_whitespace();
    let Some(word) = words.next() else {
        return Command::Empty;
    };
    let argument = words.next();
    let extra = words.next();

    match (find_command(word), argument, extra) {
        (Some(entry), None, _) => (entry.build)(None),
        (Some(entry), Some(argument), None) if entry.takes_argument => {
            (entry.build)(Some(argument))
        }
        _ => Command::Chat(input.to_string()),
    }
}

/// Whether `input` would be handled as a command rather than sent as chat.
pub fn is_command(input: &str) -> bool {
    !matches!(classify(input), Command::Chat(_) | Command::Empty)
}

/// The command reference as a markdown table.
pub fn help_markdown() -> String {
    let mut help_md = String::from("| Command | Description |\n|---|---|\n");
    for entry in all_commands() {
        help_md.push_str(&format!("| {} | {} |\n", entry.usage, entry.help));
    }
    help_md
}
