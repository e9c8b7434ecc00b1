use super::Command;

pub type CommandBuilder = fn(Option<&str>) -> Command;

pub struct CommandEntry {
    /// Accepted spellings, compared against the lowercased first word.
    pub names: &'static [&'static str],
    pub usage: &'static str,
    pub help: &'static str,
    pub takes_argument: bool,
    pub build: CommandBuilder,
}

pub fn all_commands() -> &'static [CommandEntry] {
    COMMANDS
}

pub fn find_command(word: &str) -> Option<&'static CommandEntry> {
    all_commands()
        .iter()
        .find(|entry| entry.names.iter().any(|name| *name == word))
}

const COMMANDS: &[CommandEntry] = &[
    CommandEntry {
        names: &["l"],
        usage: "l",
        help: "List models",
        takes_argument: false,
        build: |_| Command::ListModels,
    },
    CommandEntry {
        names: &["n"],
        usage: "n",
        help: "New chat",
        takes_argument: false,
        build: |_| Command::NewChat,
    },
    CommandEntry {
        names: &["?", "h"],
        usage: "? or h",
        help: "Help",
        takes_argument: false,
        build: |_| Command::Help,
    },
    CommandEntry {
        names: &["m"],
        usage: "m",
        help: "Change model",
        takes_argument: false,
        build: |_| Command::ChangeModel,
    },
    CommandEntry {
        names: &["p"],
        usage: "p [name]",
        help: "Change provider",
        takes_argument: true,
        build: |arg| Command::ChangeProvider(arg.map(str::to_string)),
    },
    CommandEntry {
        names: &["q", "quit", "exit"],
        usage: "q",
        help: "Quit",
        takes_argument: false,
        build: |_| Command::Quit,
    },
];
