use std::io::{self, IsTerminal};

/// Reports whether the process is attached to interactive terminals.
pub trait TerminalClient: Send + Sync {
    fn stdout_is_terminal(&self) -> bool;

    fn stderr_is_terminal(&self) -> bool;
}

/// Terminal detection for the real process streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTerminalClient;

impl TerminalClient for SystemTerminalClient {
    fn stdout_is_terminal(&self) -> bool {
        io::stdout().is_terminal()
    }

    fn stderr_is_terminal(&self) -> bool {
        io::stderr().is_terminal()
    }
}
