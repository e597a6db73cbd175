use shared::domain::RotationGroupId;

/// One line typed by the operator on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Advance,
    Back,
    JumpTo(usize),
    Exit,
    Start(Option<RotationGroupId>),
    Stop,
    Status,
    OpenOutput,
    Close,
    Timer(TimerCommand),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    Start,
    Pause,
    Reset,
}

pub const HELP: &str = "commands: next | back | jump <n> | exit | start [group] | stop | status | \
open-output | close | timer start|pause|reset | quit";

impl OperatorCommand {
    /// Slide numbers typed by the operator are 1-based.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(HELP.to_string());
        };
        let arg = words.next();

        let command = match (verb.to_ascii_lowercase().as_str(), arg) {
            ("next" | "n" | "advance", None) => OperatorCommand::Advance,
            ("back" | "b" | "prev", None) => OperatorCommand::Back,
            ("jump" | "j", Some(raw)) => {
                let number: usize = raw
                    .parse()
                    .map_err(|_| format!("'{raw}' is not a slide number"))?;
                let index = number
                    .checked_sub(1)
                    .ok_or_else(|| "slide numbers start at 1".to_string())?;
                OperatorCommand::JumpTo(index)
            }
            ("exit", None) => OperatorCommand::Exit,
            ("start", None) => OperatorCommand::Start(None),
            ("start", Some(raw)) => {
                let id: i64 = raw
                    .parse()
                    .map_err(|_| format!("'{raw}' is not a rotation group id"))?;
                OperatorCommand::Start(Some(RotationGroupId(id)))
            }
            ("stop", None) => OperatorCommand::Stop,
            ("status" | "s", None) => OperatorCommand::Status,
            ("open-output", None) => OperatorCommand::OpenOutput,
            ("close", None) => OperatorCommand::Close,
            ("timer", Some("start")) => OperatorCommand::Timer(TimerCommand::Start),
            ("timer", Some("pause")) => OperatorCommand::Timer(TimerCommand::Pause),
            ("timer", Some("reset")) => OperatorCommand::Timer(TimerCommand::Reset),
            ("quit" | "q", None) => OperatorCommand::Quit,
            _ => return Err(format!("unrecognised command '{}'; {HELP}", line.trim())),
        };

        if words.next().is_some() {
            return Err(format!("too many arguments in '{}'", line.trim()));
        }
        Ok(command)
    }
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
