use clap::{Arg, ArgAction, ArgMatches, Command};

pub const SUBCOMMAND: &str = "migrate";
pub const ARG_REVERT: &str = "revert";
pub const ARG_TARGET: &str = "target";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    /// Revert the most recent migration.
    RevertLast,
    /// Revert every migration newer than the given version.
    RevertTo(i64),
}

impl Direction {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        if !matches.get_flag(ARG_REVERT) {
            return Self::Up;
        }
        match matches.get_one::<i64>(ARG_TARGET) {
            Some(target) => Self::RevertTo(*target),
            None => Self::RevertLast,
        }
    }
}

#[must_use]
pub fn subcommand() -> Command {
    Command::new(SUBCOMMAND)
        .about("Apply or revert database migrations and exit")
        .arg(
            Arg::new(ARG_REVERT)
                .long(ARG_REVERT)
                .help("Revert instead of applying")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_TARGET)
                .long(ARG_TARGET)
                .help("Revert every migration newer than this version (0 reverts all)")
                .requires(ARG_REVERT)
                .value_parser(clap::value_parser!(i64).range(0..)),
        )
}
