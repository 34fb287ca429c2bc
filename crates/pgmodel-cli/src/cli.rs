use pgmodel::Verb;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    Dispatch,
    Entities,
}

#[derive(Debug, Clone)]
pub enum Command {
    Help(HelpTopic),
    Entities(EntitiesArgs),
    Dispatch(DispatchArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Debug, Clone)]
pub struct EntitiesArgs {
    pub config: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DispatchArgs {
    pub verb: Verb,
    pub entity: String,
    /// `key=value` assignments, in command line order.
    pub assignments: Vec<String>,
    pub json: Option<String>,
    pub config: PathBuf,
    pub database: Option<String>,
    pub dry_run: bool,
    pub format: OutputFormat,
}

pub const DEFAULT_CONFIG: &str = "pgmodel.toml";

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1);
    let Some(first) = it.next() else {
        return Ok(Command::Help(HelpTopic::Root));
    };

    match first.as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help(HelpTopic::Root)),
        "entities" => parse_entities(it.map(|s| s.as_str())),
        verb => {
            let verb = parse_verb(verb)?;
            parse_dispatch(verb, it.map(|s| s.as_str()))
        }
    }
}

/// Verb names are case-insensitive; upper-case tokens are read as HTTP
/// methods so that unsupported methods answer 405.
fn parse_verb(token: &str) -> anyhow::Result<Verb> {
    let is_method = token.chars().all(|c| c.is_ascii_uppercase());
    let verb = if is_method {
        Verb::from_http_method(token)?
    } else {
        token.parse::<Verb>()?
    };
    Ok(verb)
}

fn parse_config_flag<'a>(
    token: &'a str,
    it: &mut impl Iterator<Item = &'a str>,
) -> anyhow::Result<Option<PathBuf>> {
    if token == "--config" {
        let Some(v) = it.next() else {
            anyhow::bail!("--config requires a value");
        };
        return Ok(Some(PathBuf::from(v)));
    }
    if let Some(v) = token.strip_prefix("--config=") {
        return Ok(Some(PathBuf::from(v)));
    }
    Ok(None)
}

fn parse_entities<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut config = PathBuf::from(DEFAULT_CONFIG);

    while let Some(token) = it.next() {
        if matches!(token, "-h" | "--help") {
            return Ok(Command::Help(HelpTopic::Entities));
        }
        match parse_config_flag(token, &mut it)? {
            Some(path) => config = path,
            None => anyhow::bail!("unknown argument: {token}"),
        }
    }

    Ok(Command::Entities(EntitiesArgs { config }))
}

fn parse_dispatch<'a>(verb: Verb, mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut entity: Option<String> = None;
    let mut assignments = Vec::new();
    let mut json: Option<String> = None;
    let mut config = PathBuf::from(DEFAULT_CONFIG);
    let mut database: Option<String> = None;
    let mut dry_run = false;
    let mut format = OutputFormat::default();

    while let Some(token) = it.next() {
        if let Some(path) = parse_config_flag(token, &mut it)? {
            config = path;
            continue;
        }
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Dispatch)),
            "--dry-run" => dry_run = true,
            "--json" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--json requires a value");
                };
                json = Some(v.to_string());
            }
            "--database" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--database requires a value");
                };
                database = Some(v.to_string());
            }
            "--format" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--format requires a value");
                };
                format = parse_format(v)?;
            }
            _ if token.starts_with("--format=") => {
                format = parse_format(token.trim_start_matches("--format="))?;
            }
            _ if token.starts_with("--") => anyhow::bail!("unknown flag: {token}"),
            _ if entity.is_none() => entity = Some(token.to_string()),
            _ => assignments.push(token.to_string()),
        }
    }

    let Some(entity) = entity else {
        anyhow::bail!("missing entity name (see `pgmodel --help`)");
    };

    Ok(Command::Dispatch(DispatchArgs {
        verb,
        entity,
        assignments,
        json,
        config,
        database,
        dry_run,
        format,
    }))
}

fn parse_format(v: &str) -> anyhow::Result<OutputFormat> {
    match v {
        "json" => Ok(OutputFormat::Json),
        "table" => Ok(OutputFormat::Table),
        other => anyhow::bail!("unknown format: {other} (expected json or table)"),
    }
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => {
            println!(
                "\
pgmodel - dispatch REST-style verbs against declared entities

USAGE:
  pgmodel <VERB> <ENTITY> [key=value ...] [OPTIONS]
  pgmodel entities [OPTIONS]

VERBS:
  get, post, put, delete, count
  GET, POST, PUT, DELETE (HTTP methods)

Run `pgmodel get --help` for dispatch options."
            );
        }
        HelpTopic::Dispatch => {
            println!(
                "\
USAGE:
  pgmodel <VERB> <ENTITY> [key=value ...] [OPTIONS]

PARAMETERS:
  key=value             One parameter; repeat a key (or use key[]=v) for a list
  xjoin=a,b             Join related entities
  xreturn=f1,f2         Projection
  xorder_by=f xorder=desc
  xgroup_by=f
  xlimit=N xoffset=N

OPTIONS:
  --json <OBJECT>       Parameters as a JSON object
  --config <FILE>       Config file path (default: pgmodel.toml)
  --database <URL>      Override database.url from config
  --dry-run             Print the SQL without connecting
  --format <FMT>        json (default) or table
  -h, --help            Print help"
            );
        }
        HelpTopic::Entities => {
            println!(
                "\
USAGE:
  pgmodel entities [OPTIONS]

OPTIONS:
  --config <FILE>       Config file path (default: pgmodel.toml)
  -h, --help            Print help"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("pgmodel")
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn parses_dispatch() {
        let cmd = parse_args(&args(&[
            "get",
            "item",
            "name=%lamp%",
            "xjoin=category",
            "--dry-run",
            "--format=table",
        ]))
        .unwrap();
        let Command::Dispatch(d) = cmd else {
            panic!("expected dispatch");
        };
        assert_eq!(d.verb, Verb::Get);
        assert_eq!(d.entity, "item");
        assert_eq!(d.assignments, vec!["name=%lamp%", "xjoin=category"]);
        assert!(d.dry_run);
        assert_eq!(d.format, OutputFormat::Table);
        assert_eq!(d.config, PathBuf::from(DEFAULT_CONFIG));
    }

    #[test]
    fn http_methods_map_to_verbs() {
        let Command::Dispatch(d) = parse_args(&args(&["PUT", "item"])).unwrap() else {
            panic!("expected dispatch");
        };
        assert_eq!(d.verb, Verb::Put);

        let err = parse_args(&args(&["PATCH", "item"])).unwrap_err();
        let err = err.downcast_ref::<pgmodel::ModelError>().unwrap();
        assert_eq!(err.status_code(), 405);

        let err = parse_args(&args(&["frobnicate", "item"])).unwrap_err();
        let err = err.downcast_ref::<pgmodel::ModelError>().unwrap();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn entity_is_required() {
        assert!(parse_args(&args(&["count"])).is_err());
        assert!(matches!(
            parse_args(&args(&[])).unwrap(),
            Command::Help(HelpTopic::Root)
        ));
    }

    #[test]
    fn parses_entities() {
        let Command::Entities(e) = parse_args(&args(&["entities", "--config", "x.toml"])).unwrap()
        else {
            panic!("expected entities");
        };
        assert_eq!(e.config, PathBuf::from("x.toml"));
    }
}
