use crate::cli::{DEFAULT_CONFIG, DispatchArgs, EntitiesArgs, OutputFormat};
use crate::config::ProjectConfig;
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use pgmodel::pool::{PoolSettings, create_pool_from_settings};
use pgmodel::{
    Driver, EntityRegistry, InstrumentedDriver, LoggingMonitor, MonitorConfig, MonitorSettings,
    Outcome, Params, Record, TracingSqlHook, WriteInfo,
};
use std::path::Path;

fn load(config: &Path) -> anyhow::Result<(ProjectConfig, EntityRegistry)> {
    let explicit = config != Path::new(DEFAULT_CONFIG);
    let project = ProjectConfig::load(config, explicit)?;
    let dir = project.resolve_path(&project.file.models.dir);
    let registry = EntityRegistry::load_dir(&dir)?.with_config(project.file.model.clone());
    tracing::debug!(dir = %dir.display(), entities = registry.len(), "registry ready");
    Ok((project, registry))
}

/// Command line assignments first, then the JSON object on top.
fn collect_params(args: &DispatchArgs) -> anyhow::Result<Params> {
    let mut params = Params::from_assignments(&args.assignments)?;
    if let Some(raw) = &args.json {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| pgmodel::ModelError::bad_request(format!("--json: {e}")))?;
        for (key, value) in Params::from_json(&value)?.iter() {
            params.insert(key, value.clone());
        }
    }
    Ok(params)
}

pub async fn dispatch(args: DispatchArgs) -> anyhow::Result<()> {
    let (project, registry) = load(&args.config)?;
    let params = collect_params(&args)?;
    let mut model = registry.model(&args.entity, params)?;

    if args.dry_run {
        println!("{}", model.prepare(args.verb)?);
        return Ok(());
    }

    let url = project.database_url(args.database.as_deref())?;
    let mut settings = PoolSettings::new(url);
    if let Some(db) = &project.file.database {
        settings = settings.max_size(db.pool_size);
    }
    let pool = create_pool_from_settings(&settings)?;
    let client = pool.get().await?;

    let driver = instrument(client, &project.file.monitor);
    let outcome = model.dispatch(args.verb, &driver).await?;
    print_outcome(&outcome, args.format)?;
    Ok(())
}

/// Wrap a driver with SQL tracing, plus a logging monitor (slow statements
/// at `warn`) when `[monitor]` enables monitoring.
fn instrument<D: Driver>(driver: D, settings: &MonitorSettings) -> InstrumentedDriver<D> {
    let config = MonitorConfig::from(settings);
    let monitored = config.monitoring_enabled;
    let driver = InstrumentedDriver::new(driver)
        .with_config(config)
        .add_hook(TracingSqlHook::new());
    if monitored {
        driver.with_monitor(LoggingMonitor::new())
    } else {
        driver
    }
}

pub fn entities(args: EntitiesArgs) -> anyhow::Result<()> {
    let (_, registry) = load(&args.config)?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            ["Entity", "Table", "Fields", "Joins", "Verbs"]
                .into_iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold).fg(Color::Cyan)),
        );

    for def in registry.entities() {
        let verbs: Vec<&str> = def.verbs.iter().map(|v| v.as_str()).collect();
        table.add_row(vec![
            Cell::new(&def.name).fg(Color::Yellow),
            Cell::new(&def.table),
            Cell::new(def.mapping.keys().cloned().collect::<Vec<_>>().join(", ")),
            Cell::new(def.joins.keys().cloned().collect::<Vec<_>>().join(", ")),
            Cell::new(verbs.join(", ")),
        ]);
    }

    println!("{table}");
    println!("{} {}", registry.len().to_string().bold(), "entities".bright_black());
    Ok(())
}

fn print_outcome(outcome: &Outcome, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Table => match outcome {
            Outcome::Records(records) => println!("{}", records_table(records)),
            Outcome::Write(info) => println!("{}", write_table(info)),
            Outcome::Count(n) => println!("{n}"),
        },
    }
    Ok(())
}

fn records_table(records: &[Record]) -> Table {
    let mut columns: Vec<&str> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            columns
                .iter()
                .map(|c| Cell::new(c).add_attribute(Attribute::Bold).fg(Color::Cyan)),
        );

    for record in records {
        table.add_row(columns.iter().map(|c| match record.get(*c) {
            Some(Some(v)) => Cell::new(v),
            Some(None) => Cell::new("(null)").fg(Color::DarkGrey),
            None => Cell::new(""),
        }));
    }
    table
}

fn write_table(info: &WriteInfo) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        Cell::new("Result").add_attribute(Attribute::Bold).fg(Color::Cyan),
        Cell::new("Value").add_attribute(Attribute::Bold).fg(Color::Cyan),
    ]);
    table.add_row(vec![
        Cell::new("last_insert_id"),
        Cell::new(info.last_insert_id.as_deref().unwrap_or("(none)")),
    ]);
    table.add_row(vec![
        Cell::new("affected_rows"),
        Cell::new(info.affected_rows.to_string()).fg(Color::Green),
    ]);
    table.add_row(vec![Cell::new("driver_info"), Cell::new(&info.driver_info)]);
    table
}
