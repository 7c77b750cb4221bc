#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pay,
    Status,
    ListPending,
    Sweep,
}

impl Command {
    /// Parses `/name` or `/name@botname`, ignoring trailing arguments.
    pub fn parse(text: &str) -> Option<Self> {
        let token = text.split_whitespace().next()?;
        let name = token.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);

        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Command::Start),
            "pagar" => Some(Command::Pay),
            "status" => Some(Command::Status),
            "pendentes" => Some(Command::ListPending),
            "limpar" => Some(Command::Sweep),
            _ => None,
        }
    }

    pub fn is_admin_only(self) -> bool {
        matches!(self, Command::ListPending | Command::Sweep)
    }
}
