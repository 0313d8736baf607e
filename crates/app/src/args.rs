use std::fmt;
use std::path::{Path, PathBuf};

use spaced_core::model::{CardId, DeckId};
use spaced_core::scheduler::{LapsePolicy, Scheduler, SchedulerConfig};

const DEFAULT_DB_URL: &str = "sqlite://spaced.sqlite3";
const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    MissingArgument { name: &'static str },
    InvalidId { name: &'static str, raw: String },
    InvalidValue { name: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    Config(spaced_core::Error),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::MissingArgument { name } => write!(f, "missing <{name}>"),
            ArgsError::InvalidId { name, raw } => write!(f, "invalid <{name}> value: {raw}"),
            ArgsError::InvalidValue { name, raw } => write!(f, "invalid {name} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::Config(err) => write!(f, "invalid configuration: {err}"),
        }
    }
}

impl std::error::Error for ArgsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArgsError::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<spaced_core::Error> for ArgsError {
    fn from(err: spaced_core::Error) -> Self {
        ArgsError::Config(err)
    }
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app decks       [--page <n>]");
    eprintln!("  app create-deck <name>");
    eprintln!("  app delete-deck <deck-id>");
    eprintln!("  app add-card    <deck-id> <front> <back>");
    eprintln!("  app delete-card <card-id>");
    eprintln!("  app cards       <deck-id>");
    eprintln!("  app review      <deck-id> [--random] [--reverse] [--strict] [--learn] [--force]");
    eprintln!("  app seed");
    eprintln!();
    eprintln!("Common flags:");
    eprintln!("  --db <sqlite_url>   (default {DEFAULT_DB_URL})");
    eprintln!("  --page-size <n>     (default {DEFAULT_PAGE_SIZE})");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  SPACED_DB_URL, SPACED_PAGE_SIZE, RUST_LOG");
    eprintln!("  SPACED_INTERVALS (days, e.g. 1,2,4,8,16,32), SPACED_MAX_REVIEW_COUNT (default 5)");
    eprintln!("  SPACED_LAPSE_POLICY (advance_from_zero | hold), SPACED_SAME_DAY_START (true | false)");
}

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

/// Mode flags for `review`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewFlags {
    pub random: bool,
    pub reverse: bool,
    pub strict: bool,
    pub learn: bool,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Decks,
    CreateDeck { name: String },
    DeleteDeck { deck_id: DeckId },
    AddCard { deck_id: DeckId, front: String, back: String },
    DeleteCard { card_id: CardId },
    Cards { deck_id: DeckId },
    Review { deck_id: DeckId, flags: ReviewFlags },
    Seed,
}

/// Settings after layering defaults, environment and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub db_url: String,
    pub page: usize,
    pub page_size: usize,
    pub scheduler: Scheduler,
}

impl Settings {
    fn from_env(env: &impl Fn(&str) -> Option<String>) -> Result<Self, ArgsError> {
        let db_url = env("SPACED_DB_URL")
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| DEFAULT_DB_URL.to_owned(), normalize_sqlite_url);
        let page_size = match env("SPACED_PAGE_SIZE") {
            Some(raw) => parse_positive("SPACED_PAGE_SIZE", raw)?,
            None => DEFAULT_PAGE_SIZE,
        };
        Ok(Self {
            db_url,
            page: 1,
            page_size,
            scheduler: scheduler_from_env(env)?,
        })
    }
}

fn scheduler_from_env(env: &impl Fn(&str) -> Option<String>) -> Result<Scheduler, ArgsError> {
    let mut config = SchedulerConfig::default();
    if let Some(raw) = env("SPACED_INTERVALS") {
        config.intervals = parse_intervals("SPACED_INTERVALS", raw)?;
    }
    if let Some(raw) = env("SPACED_MAX_REVIEW_COUNT") {
        config.max_review_count = raw
            .trim()
            .parse()
            .map_err(|_| ArgsError::InvalidValue {
                name: "SPACED_MAX_REVIEW_COUNT",
                raw,
            })?;
    }
    if let Some(raw) = env("SPACED_LAPSE_POLICY") {
        config.lapse_policy = raw
            .parse::<LapsePolicy>()
            .map_err(|err| ArgsError::Config(err.into()))?;
    }
    if let Some(raw) = env("SPACED_SAME_DAY_START") {
        config.same_day_start = parse_switch("SPACED_SAME_DAY_START", raw)?;
    }
    config.validate().map_err(|err| ArgsError::Config(err.into()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub settings: Settings,
    pub command: Command,
}

fn parse_positive(name: &'static str, raw: String) -> Result<usize, ArgsError> {
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ArgsError::InvalidValue { name, raw }),
    }
}

/// Comma-separated day offsets, e.g. `1,2,4,8`.
fn parse_intervals(name: &'static str, raw: String) -> Result<Vec<u32>, ArgsError> {
    raw.split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ArgsError::InvalidValue { name, raw })
}

fn parse_switch(name: &'static str, raw: String) -> Result<bool, ArgsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ArgsError::InvalidValue { name, raw }),
    }
}

fn parse_id<T: std::str::FromStr>(name: &'static str, raw: Option<String>) -> Result<T, ArgsError> {
    let raw = raw.ok_or(ArgsError::MissingArgument { name })?;
    raw.parse::<T>().map_err(|_| ArgsError::InvalidId { name, raw })
}

fn require_text(name: &'static str, raw: Option<String>) -> Result<String, ArgsError> {
    raw.ok_or(ArgsError::MissingArgument { name })
}

/// Parse `argv` (without the program name), reading environment through `env`.
///
/// No subcommand lists the decks.
pub fn parse(
    argv: Vec<String>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Invocation, ArgsError> {
    let mut settings = Settings::from_env(&env)?;
    let mut args = argv.into_iter().peekable();

    let has_command = args.peek().is_some_and(|first| !first.starts_with('-'));
    let name = if has_command {
        args.next().unwrap_or_default()
    } else {
        "decks".to_owned()
    };

    let mut flags = ReviewFlags::default();
    let mut positional = Vec::new();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                let value = require_value(&mut args, "--db")?;
                if value.trim().is_empty() {
                    return Err(ArgsError::InvalidDbUrl { raw: value });
                }
                settings.db_url = normalize_sqlite_url(value);
            }
            "--page" => settings.page = parse_positive("--page", require_value(&mut args, "--page")?)?,
            "--page-size" => {
                settings.page_size =
                    parse_positive("--page-size", require_value(&mut args, "--page-size")?)?;
            }
            "--random" if name == "review" => flags.random = true,
            "--reverse" if name == "review" => flags.reverse = true,
            "--strict" if name == "review" => flags.strict = true,
            "--learn" if name == "review" => flags.learn = true,
            "--force" if name == "review" => flags.force = true,
            "--help" | "-h" => {
                return Ok(Invocation {
                    settings,
                    command: Command::Help,
                });
            }
            _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let command = match name.as_str() {
        "help" => Command::Help,
        "decks" => Command::Decks,
        "create-deck" => Command::CreateDeck {
            name: require_text("name", positional.next())?,
        },
        "delete-deck" => Command::DeleteDeck {
            deck_id: parse_id("deck-id", positional.next())?,
        },
        "add-card" => Command::AddCard {
            deck_id: parse_id("deck-id", positional.next())?,
            front: require_text("front", positional.next())?,
            back: require_text("back", positional.next())?,
        },
        "delete-card" => Command::DeleteCard {
            card_id: parse_id("card-id", positional.next())?,
        },
        "cards" => Command::Cards {
            deck_id: parse_id("deck-id", positional.next())?,
        },
        "review" => Command::Review {
            deck_id: parse_id("deck-id", positional.next())?,
            flags,
        },
        "seed" => Command::Seed,
        other => return Err(ArgsError::UnknownCommand(other.to_owned())),
    };
    if let Some(extra) = positional.next() {
        return Err(ArgsError::UnknownArg(extra));
    }

    Ok(Invocation { settings, command })
}

//
// ─── SQLITE URL ────────────────────────────────────────────────────────────────
//

pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim();
    let path = Path::new(trimmed.strip_prefix("sqlite:").unwrap_or(trimmed));
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the database file and its parent directories if missing.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_owned(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_owned(),
        }
        .into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn no_arguments_lists_decks_with_defaults() {
        let inv = parse(Vec::new(), no_env).unwrap();
        assert_eq!(inv.command, Command::Decks);
        assert_eq!(inv.settings.db_url, DEFAULT_DB_URL);
        assert_eq!(inv.settings.page, 1);
        assert_eq!(inv.settings.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(inv.settings.scheduler, Scheduler::new());
    }

    #[test]
    fn flags_override_environment() {
        let env = |key: &str| match key {
            "SPACED_DB_URL" => Some("sqlite::memory:".to_owned()),
            "SPACED_PAGE_SIZE" => Some("5".to_owned()),
            "SPACED_LAPSE_POLICY" => Some("hold".to_owned()),
            _ => None,
        };
        let inv = parse(args(&["decks", "--page-size", "3", "--page", "2"]), env).unwrap();
        assert_eq!(inv.settings.db_url, "sqlite::memory:");
        assert_eq!(inv.settings.page_size, 3);
        assert_eq!(inv.settings.page, 2);
        assert_eq!(inv.settings.scheduler.lapse_policy(), LapsePolicy::Hold);

        let inv = parse(args(&["decks"]), env).unwrap();
        assert_eq!(inv.settings.page_size, 5);
    }

    #[test]
    fn bad_environment_is_reported() {
        let env = |key: &str| (key == "SPACED_LAPSE_POLICY").then(|| "sometimes".to_owned());
        assert!(matches!(parse(Vec::new(), env), Err(ArgsError::Config(_))));

        let env = |key: &str| (key == "SPACED_PAGE_SIZE").then(|| "0".to_owned());
        assert!(matches!(
            parse(Vec::new(), env),
            Err(ArgsError::InvalidValue { name: "SPACED_PAGE_SIZE", .. })
        ));
    }

    #[test]
    fn scheduler_settings_come_from_environment() {
        let env = |key: &str| match key {
            "SPACED_INTERVALS" => Some("1, 2, 4, 8, 16, 32".to_owned()),
            "SPACED_MAX_REVIEW_COUNT" => Some("6".to_owned()),
            "SPACED_SAME_DAY_START" => Some("true".to_owned()),
            _ => None,
        };
        let scheduler = parse(Vec::new(), env).unwrap().settings.scheduler;
        assert_eq!(scheduler.table().as_slice(), &[0, 1, 2, 4, 8, 16, 32]);
        assert_eq!(scheduler.max_review_count(), 6);
        assert_eq!(scheduler.lapse_policy(), LapsePolicy::AdvanceFromZero);
    }

    #[test]
    fn malformed_scheduler_settings_are_rejected() {
        let env = |key: &str| (key == "SPACED_INTERVALS").then(|| "1,x".to_owned());
        assert!(matches!(
            parse(Vec::new(), env),
            Err(ArgsError::InvalidValue { name: "SPACED_INTERVALS", .. })
        ));

        let env = |key: &str| (key == "SPACED_INTERVALS").then(|| "4,2".to_owned());
        assert!(matches!(parse(Vec::new(), env), Err(ArgsError::Config(_))));

        let env = |key: &str| (key == "SPACED_MAX_REVIEW_COUNT").then(|| "0".to_owned());
        assert!(matches!(parse(Vec::new(), env), Err(ArgsError::Config(_))));

        let env = |key: &str| (key == "SPACED_SAME_DAY_START").then(|| "maybe".to_owned());
        assert!(matches!(
            parse(Vec::new(), env),
            Err(ArgsError::InvalidValue { name: "SPACED_SAME_DAY_START", .. })
        ));
    }

    #[test]
    fn review_collects_mode_flags() {
        let inv = parse(args(&["review", "7", "--random", "--strict", "--force"]), no_env).unwrap();
        assert_eq!(
            inv.command,
            Command::Review {
                deck_id: DeckId::new(7),
                flags: ReviewFlags {
                    random: true,
                    strict: true,
                    force: true,
                    ..ReviewFlags::default()
                },
            }
        );

        let err = parse(args(&["cards", "7", "--random"]), no_env).unwrap_err();
        assert!(matches!(err, ArgsError::UnknownArg(arg) if arg == "--random"));
    }

    #[test]
    fn positional_arguments_are_checked() {
        let inv = parse(args(&["add-card", "3", "dog", "inu"]), no_env).unwrap();
        assert_eq!(
            inv.command,
            Command::AddCard {
                deck_id: DeckId::new(3),
                front: "dog".into(),
                back: "inu".into(),
            }
        );

        assert!(matches!(
            parse(args(&["add-card", "3", "dog"]), no_env),
            Err(ArgsError::MissingArgument { name: "back" })
        ));
        assert!(matches!(
            parse(args(&["delete-card", "x"]), no_env),
            Err(ArgsError::InvalidId { name: "card-id", .. })
        ));
        assert!(matches!(
            parse(args(&["seed", "extra"]), no_env),
            Err(ArgsError::UnknownArg(_))
        ));
        assert!(matches!(
            parse(args(&["frobnicate"]), no_env),
            Err(ArgsError::UnknownCommand(_))
        ));
        assert!(matches!(
            parse(args(&["--db"]), no_env),
            Err(ArgsError::MissingValue { flag: "--db" })
        ));
    }

    #[test]
    fn relative_paths_become_absolute_urls() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert_eq!(normalize_sqlite_url("sqlite:///tmp/a.db".into()), "sqlite:///tmp/a.db");
        assert_eq!(normalize_sqlite_url("sqlite:/tmp/a.db".into()), "sqlite:///tmp/a.db");
        assert!(normalize_sqlite_url("data/a.db".into()).starts_with("sqlite:///"));
    }
}
