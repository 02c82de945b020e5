#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const VALUE_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "mode",
        action: "set_mode",
    },
    CommandSpec {
        command: "model",
        action: "set_model",
    },
    CommandSpec {
        command: "aspect",
        action: "set_aspect_ratio",
    },
    CommandSpec {
        command: "size",
        action: "set_resolution",
    },
    CommandSpec {
        command: "delete",
        action: "delete",
    },
];

pub(crate) const PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "source",
        action: "set_source",
    },
    CommandSpec {
        command: "download",
        action: "download",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "clear_source",
        action: "clear_source",
    },
    CommandSpec {
        command: "history",
        action: "history",
    },
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub const STUDIO_HELP_COMMANDS: &[&str] = &[
    "/mode generate|edit",
    "/model flash|pro",
    "/aspect 1:1|3:4|4:3|9:16|16:9",
    "/size 1K|2K|4K",
    "/source <image path>",
    "/clear_source",
    "/history",
    "/delete <id>",
    "/download <id> [dir]",
    "/status",
    "/help",
    "/quit",
    "//<text> (prompt starting with /)",
];

pub(crate) fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}
