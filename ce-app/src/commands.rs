//! Top-level command keywords. These win over any in-progress dialog.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    SearchStart,
    CreateAgentStart,
    AssignOrderStart,
    Stats,
    Info,
    Cancel,
}

const KEYWORDS: &[(Command, &[&str])] = &[
    (Command::Start, &["/start", "start", "inicio", "hola"]),
    (Command::Help, &["/help", "help", "ayuda"]),
    (Command::SearchStart, &["/cliente", "cliente", "buscar", "search"]),
    (
        Command::CreateAgentStart,
        &["/comercial", "comercial", "nuevo comercial", "registrar comercial"],
    ),
    (
        Command::AssignOrderStart,
        &["/asignar", "asignar", "asignar orden", "asignar pedido"],
    ),
    (Command::Stats, &["/resumen", "resumen", "estadisticas", "stats"]),
    (Command::Info, &["/info", "info", "detalle", "detalles"]),
    (Command::Cancel, &["/cancelar", "/cancel"]),
];

impl Command {
    /// Case-insensitive match on the trimmed text. Telegram's `/cmd@BotName`
    /// form is accepted for slash commands.
    pub fn parse(text: &str) -> Option<Self> {
        let lowered = text.trim().to_lowercase();
        let normalized = match lowered.split_once('@') {
            Some((command, _bot)) if command.starts_with('/') => command,
            _ => lowered.as_str(),
        };
        KEYWORDS
            .iter()
            .find(|(_, words)| words.contains(&normalized))
            .map(|(command, _)| *command)
    }
}
