//! Command-line argument parsing.

use crate::error::UsageError;
use std::path::PathBuf;

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create the data directory and empty ledger files.
    Init,
    /// Reconcile the settlement event stored in a JSON file.
    Reconcile { event_path: PathBuf },
    /// List every recorded payout.
    Payouts,
    /// Show one payout with its donations.
    Payout { id: String },
    /// Show one month's payouts and totals.
    Monthly { year: i32, month: u32 },
    /// Check the ledger files against each other.
    Audit,
}

impl Command {
    /// Parses arguments, excluding the program name.
    pub fn parse<I, S>(args: I) -> Result<Command, UsageError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        let name = args.next().ok_or(UsageError::MissingCommand)?;

        let command = match name.as_str() {
            "init" => Command::Init,
            "reconcile" => Command::Reconcile {
                event_path: PathBuf::from(required(&mut args, "event.json")?),
            },
            "payouts" => Command::Payouts,
            "payout" => Command::Payout {
                id: required(&mut args, "payout-id")?,
            },
            "monthly" => {
                let year = parsed(&mut args, "year")?;
                let month = parsed(&mut args, "month")?;
                Command::Monthly { year, month }
            }
            "audit" => Command::Audit,
            _ => return Err(UsageError::UnknownCommand(name)),
        };

        if let Some(extra) = args.next() {
            return Err(UsageError::UnexpectedArgument(extra));
        }
        Ok(command)
    }
}

fn required(
    args: &mut impl Iterator<Item = String>,
    name: &'static str,
) -> Result<String, UsageError> {
    args.next()
        .filter(|value| !value.trim().is_empty())
        .ok_or(UsageError::MissingArgument(name))
}

fn parsed<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    name: &'static str,
) -> Result<T, UsageError> {
    let value = required(args, name)?;
    value
        .trim()
        .parse()
        .map_err(|_| UsageError::InvalidArgument { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(["init"]), Ok(Command::Init));
        assert_eq!(Command::parse(["payouts"]), Ok(Command::Payouts));
        assert_eq!(Command::parse(["audit"]), Ok(Command::Audit));
        assert_eq!(
            Command::parse(["reconcile", "event.json"]),
            Ok(Command::Reconcile {
                event_path: PathBuf::from("event.json")
            })
        );
        assert_eq!(
            Command::parse(["payout", "po_1"]),
            Ok(Command::Payout {
                id: "po_1".to_string()
            })
        );
        assert_eq!(
            Command::parse(["monthly", "2025", "03"]),
            Ok(Command::Monthly {
                year: 2025,
                month: 3
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Command::parse(Vec::<String>::new()),
            Err(UsageError::MissingCommand)
        );
        assert_eq!(
            Command::parse(["refund"]),
            Err(UsageError::UnknownCommand("refund".to_string()))
        );
        assert_eq!(
            Command::parse(["payout"]),
            Err(UsageError::MissingArgument("payout-id"))
        );
        assert_eq!(
            Command::parse(["monthly", "2025", "march"]),
            Err(UsageError::InvalidArgument {
                name: "month",
                value: "march".to_string()
            })
        );
        assert_eq!(
            Command::parse(["payouts", "--all"]),
            Err(UsageError::UnexpectedArgument("--all".to_string()))
        );
    }
}
