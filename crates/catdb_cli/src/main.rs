//! catdb - command-line front end for the cat data access façade.
//!
//! Every subcommand maps to one façade operation and prints its result as
//! pretty JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use catdb_core::{
    config, init_logging, CatService, CoreConfig, NewCat, SqliteDriver, StoreError,
};
use clap::{Parser, Subcommand};
use log::error;
use serde_json::Value;

/// Query and modify the cat store
#[derive(Parser)]
#[command(name = "catdb", version, about, long_about = None)]
struct Cli {
    /// SQLite database file (in-memory when omitted)
    #[arg(long, global = true, env = config::DB_PATH_VAR)]
    db: Option<PathBuf>,

    /// Log level: trace, debug, info, warn or error
    #[arg(long, global = true, env = config::LOG_LEVEL_VAR)]
    log_level: Option<String>,

    /// Absolute directory for log files (logging disabled when omitted)
    #[arg(long, global = true, env = config::LOG_DIR_VAR)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the backing schema
    Init,
    /// List cats, optionally at least MIN_AGE years old
    List {
        #[arg(long)]
        min_age: Option<i64>,
    },
    /// Show name, age and breed of one cat
    Get { id: i64 },
    /// Count all cats
    Count,
    /// Find cats by LIKE pattern (e.g. "Wh%")
    ByName { pattern: String },
    /// Add a cat
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: i64,
        #[arg(long)]
        breed: String,
    },
    /// Save a cat under ID, inserting it when ID is unused
    Update {
        id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: i64,
        #[arg(long)]
        breed: String,
    },
    /// Uppercase a name using the database function
    Upper { name: String },
    /// Fetch the first cat with exactly this name
    Single { name: String },
    /// List cats with their people nested
    Related {
        /// Use camelCase keys
        #[arg(long)]
        camel: bool,
    },
    /// Show link rows joined with cats and people for one cat
    Joined { cat_id: i64 },
    /// Save a report document given as a JSON object
    SaveReport { json: String },
    /// Fetch a report by title
    Report { title: String },
    /// List link rows with camelCase column aliases
    Aliased,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = CoreConfig::from_env();
    if cli.db.is_some() {
        config.db_path = cli.db.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if cli.log_dir.is_some() {
        config.log_dir = cli.log_dir.clone();
    }

    if let Some(dir) = &config.log_dir {
        if let Err(err) = init_logging(&config.log_level, dir) {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    }

    match run(cli.command, &config) {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("Error: {err}");
                ExitCode::FAILURE
            }
        },
        Err(message) => {
            error!("event=cli_command module=cli status=error error={message}");
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, config: &CoreConfig) -> Result<Value, String> {
    let conn = config.open_connection().map_err(|err| err.to_string())?;
    let service = CatService::new(SqliteDriver::new(&conn));

    // In-memory databases start empty on every run.
    if config.db_path.is_none() && !matches!(command, Commands::Init) {
        service.initialize_store().map_err(|err| err.to_string())?;
    }

    dispatch(&service, command).map_err(|err| err.to_string())
}

fn dispatch(
    service: &CatService<SqliteDriver<'_>>,
    command: Commands,
) -> Result<Value, StoreError> {
    Ok(match command {
        Commands::Init => to_json(service.initialize_store()?)?,
        Commands::List { min_age } => to_json(service.list_by_min_age(min_age)?)?,
        Commands::Get { id } => to_json(service.get_by_id(id)?)?,
        Commands::Count => Value::from(service.count()?),
        Commands::ByName { pattern } => to_json(service.get_by_name(&pattern)?)?,
        Commands::Create { name, age, breed } => {
            to_json(service.create(&NewCat::new(name, age, breed))?)?
        }
        Commands::Update {
            id,
            name,
            age,
            breed,
        } => to_json(service.update(id, &NewCat::new(name, age, breed))?)?,
        Commands::Upper { name } => Value::from(service.upper_case_name(&name)?),
        Commands::Single { name } => to_json(service.get_single_cat(&name)?)?,
        Commands::Related { camel: false } => Value::Array(service.get_records_with_related()?),
        Commands::Related { camel: true } => {
            Value::Array(service.get_records_with_related_camel()?)
        }
        Commands::Joined { cat_id } => to_json(service.get_joined_records(cat_id)?)?,
        Commands::SaveReport { json } => {
            let report: Value = serde_json::from_str(&json)
                .map_err(|err| StoreError::Driver(err.into()))?;
            service.save_report(&report)?
        }
        Commands::Report { title } => service.get_report_by_title(&title)?,
        Commands::Aliased => to_json(service.list_with_aliased_columns()?)?,
    })
}

fn to_json<T: serde::Serialize>(value: T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|err| StoreError::Driver(err.into()))
}
