use std::str::FromStr;

use anyhow::{bail, Error, Result};

use super::SessionController;

/// An action typed by the operator.
///
/// There is deliberately no start: the timer only starts when somebody is
/// seen at the desk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Pause,
    Reset,
    IncreaseMinutes,
    DecreaseMinutes,
    /// Drives the simulated sensor: `true` for "here", `false` for "away".
    SimulatePresence(bool),
    Help,
    Quit,
}

impl FromStr for OperatorCommand {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        let command = match input.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" => OperatorCommand::Pause,
            "r" | "reset" => OperatorCommand::Reset,
            "+" | "up" => OperatorCommand::IncreaseMinutes,
            "-" | "down" => OperatorCommand::DecreaseMinutes,
            "h" | "here" => OperatorCommand::SimulatePresence(true),
            "a" | "away" => OperatorCommand::SimulatePresence(false),
            "?" | "help" => OperatorCommand::Help,
            "q" | "quit" | "exit" => OperatorCommand::Quit,
            "s" | "start" => bail!("the timer starts when you sit down; there is no manual start"),
            other => bail!("unknown command '{other}' (type ? for help)"),
        };
        Ok(command)
    }
}

impl OperatorCommand {
    /// Forwards timer actions to the controller. Returns `false` for commands
    /// the controller does not handle.
    pub fn apply(self, controller: &SessionController) -> Result<bool> {
        match self {
            OperatorCommand::Pause => controller.pause()?,
            OperatorCommand::Reset => controller.reset()?,
            OperatorCommand::IncreaseMinutes => controller.adjust_duration(1)?,
            OperatorCommand::DecreaseMinutes => controller.adjust_duration(-1)?,
            OperatorCommand::SimulatePresence(_) | OperatorCommand::Help | OperatorCommand::Quit => {
                return Ok(false)
            }
        }
        Ok(true)
    }
}

pub const HELP: &str = "\
commands:
  p  pause            r  reset
  +  one more minute  -  one less minute
  h  simulate: I'm here
  a  simulate: I'm away
  ?  help             q  quit";
