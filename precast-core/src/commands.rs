//! The in-game text command surface: `<ns> on/off/block/jaunt/delay
//! <n>/dash <n>/ping [<n>]`, parsed by hand since none of this codebase's
//! stack reaches for a CLI-parsing crate outside of process argv.

use crate::error::PrecastError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    On,
    Off,
    Toggle,
    Block,
    Jaunt,
    Delay(u32),
    Dash(u32),
    Ping(Option<u32>),
}

const PING_ARG_MIN: u32 = 1;
const PING_ARG_MAX: u32 = 900;

/// Parses a command body that has already had its leading namespace token
/// stripped (e.g. `"on"`, `"delay 50"`, `"ping 300"`).
///
/// `namespace` is only used to build error messages that echo the command
/// prefix the player actually typed.
pub fn parse_command(namespace: &str, text: &str) -> Result<Command, PrecastError> {
    let mut parts = text.trim().split_whitespace();
    // `<ns>` with no args toggles enabled (§6) - there's no verb to match on.
    let Some(verb) = parts.next() else {
        return Ok(Command::Toggle);
    };
    let rest: Vec<&str> = parts.collect();

    match verb {
        "on" => expect_no_args(namespace, verb, &rest, Command::On),
        "off" => expect_no_args(namespace, verb, &rest, Command::Off),
        "block" => expect_no_args(namespace, verb, &rest, Command::Block),
        "jaunt" => expect_no_args(namespace, verb, &rest, Command::Jaunt),
        "delay" => parse_required_u32(namespace, verb, &rest).map(Command::Delay),
        "dash" => parse_required_u32(namespace, verb, &rest).map(Command::Dash),
        "ping" => parse_ping(namespace, &rest),
        other => Err(PrecastError::InvalidCommand(format!("{namespace}: unknown command `{other}`"))),
    }
}

fn expect_no_args(namespace: &str, verb: &str, rest: &[&str], command: Command) -> Result<Command, PrecastError> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(PrecastError::InvalidArgument {
            command: format!("{namespace} {verb}"),
            argument: rest.join(" "),
        })
    }
}

fn parse_required_u32(namespace: &str, verb: &str, rest: &[&str]) -> Result<u32, PrecastError> {
    match rest {
        [value] => value.parse::<u32>().map_err(|_| PrecastError::InvalidArgument {
            command: format!("{namespace} {verb}"),
            argument: (*value).to_string(),
        }),
        _ => Err(PrecastError::InvalidArgument {
            command: format!("{namespace} {verb}"),
            argument: rest.join(" "),
        }),
    }
}

fn parse_ping(namespace: &str, rest: &[&str]) -> Result<Command, PrecastError> {
    match rest {
        [] => Ok(Command::Ping(None)),
        [value] => {
            let parsed = value.parse::<u32>().map_err(|_| PrecastError::InvalidArgument {
                command: format!("{namespace} ping"),
                argument: (*value).to_string(),
            })?;
            if !(PING_ARG_MIN..=PING_ARG_MAX).contains(&parsed) {
                return Err(PrecastError::InvalidArgument {
                    command: format!("{namespace} ping"),
                    argument: (*value).to_string(),
                });
            }
            Ok(Command::Ping(Some(parsed)))
        }
        _ => Err(PrecastError::InvalidArgument {
            command: format!("{namespace} ping"),
            argument: rest.join(" "),
        }),
    }
}
