/*!
 * odoo-core CLI - Command Line Interface
 *
 * Thin wrapper over `CoreApi`: every subcommand maps to one public operation
 * and prints its result as JSON on stdout.
 */

use clap::{Parser, Subcommand, ValueEnum};
use odoo_core::{
    config::{ApiConfig, LogLevel},
    error::{ApiError, ErrorKind, Result, EXIT_SUCCESS},
    logging, output, ActionRequest, CoreApi, FieldChanged, FieldEquals, Record, Verdict,
};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "odoo-core")]
#[command(
    version,
    about = "Serialized, paginated and verified access to Odoo records",
    long_about = None
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Password, overrides the configuration file
    #[arg(long, env = "ODOO_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Log level
    #[arg(long = "log-level", value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Log file path (JSON lines)
    #[arg(long = "log", value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    /// Verbose output (debug logging and queue statistics)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read records matching a domain
    Search {
        /// Model name, e.g. res.partner
        model: String,

        /// Domain as JSON, e.g. '[["is_company","=",true]]'
        #[arg(long, default_value = "[]")]
        filters: String,

        /// Comma separated field names
        #[arg(long, value_delimiter = ',', default_value = "name")]
        fields: Vec<String>,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        #[arg(long, default_value_t = 100)]
        limit: usize,

        /// Sort specification, e.g. "id asc"
        #[arg(long)]
        order: Option<String>,

        /// Render a table instead of JSON
        #[arg(long)]
        table: bool,
    },

    /// Create a record and print its id
    Create {
        model: String,

        /// Field values as a JSON object
        #[arg(long)]
        values: String,
    },

    /// Update a record; the JSON object must contain its id
    Update {
        model: String,

        /// Field values as a JSON object, including "id"
        #[arg(long)]
        values: String,
    },

    /// Invoke a workflow action on one record
    Workflow {
        model: String,

        id: i64,

        /// Action name, e.g. action_confirm
        action: String,

        /// Extra positional arguments as a JSON array
        #[arg(long)]
        args: Option<String>,
    },

    /// Run a workflow action and verify it took effect
    Action {
        model: String,

        /// Action name, e.g. action_confirm
        action: String,

        /// Domain selecting the record, as JSON
        #[arg(long)]
        filters: String,

        /// Field(s) that must change
        #[arg(long = "compare-field", required = true)]
        compare_fields: Vec<String>,

        /// Only act when this field holds --require-value
        #[arg(long, requires = "require_value")]
        require_field: Option<String>,

        /// Required value (JSON, or a bare string)
        #[arg(long, requires = "require_field")]
        require_value: Option<String>,

        /// Value the compared fields must end up with
        #[arg(long)]
        expect_value: Option<String>,
    },

    /// Validate the configuration without contacting the server
    CheckConfig,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let hint = match e.kind() {
                ErrorKind::Configuration => Some("run `odoo-core check-config -c <FILE>`"),
                _ => None,
            };
            output::print_error(&e.to_string(), hint);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn load_config(cli: &Cli) -> Result<ApiConfig> {
    let mut config = match cli.config {
        Some(ref path) => ApiConfig::from_file(path)?,
        None => ApiConfig::default(),
    };

    if let Some(ref password) = cli.password {
        config.credentials.password = Some(password.clone());
    }
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log.is_some() {
        config.log_file = cli.log.clone();
    }
    config.verbose |= cli.verbose;

    Ok(config)
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    logging::init_logging(&config)?;

    if let Commands::CheckConfig = cli.command {
        config.validate()?;
        output::print_success(&format!(
            "{} -> {}://{}:{} (db {})",
            config.name,
            config.endpoint.protocol,
            config.endpoint.url.as_deref().unwrap_or_default(),
            config.endpoint.port.unwrap_or_default(),
            config.credentials.db.as_deref().unwrap_or_default()
        ));
        return Ok(());
    }

    let api = CoreApi::connect(&config)?;
    let result = execute(&api, cli.command).await;

    if config.verbose {
        eprintln!("{}", output::stats_table(&api.stats(), api.handshakes()));
    }
    api.shutdown().await;
    result
}

async fn execute(api: &CoreApi, command: Commands) -> Result<()> {
    match command {
        Commands::Search {
            model,
            filters,
            fields,
            offset,
            limit,
            order,
            table,
        } => {
            let filters = parse_json("--filters", &filters)?;
            let records = api
                .get_model_by_filters(&model, &filters, &fields, offset, limit, order.as_deref())
                .await?;
            if table {
                println!("{}", output::records_table(&records, &fields));
            } else {
                print_json(&records)?;
            }
        }

        Commands::Create { model, values } => {
            let record = parse_record(&values)?;
            let id = api.insert_model(&model, &record).await?;
            print_json(&serde_json::json!({ "id": id }))?;
        }

        Commands::Update { model, values } => {
            let record = parse_record(&values)?;
            let id = api.update_model(&model, &record).await?;
            print_json(&serde_json::json!({ "id": id }))?;
        }

        Commands::Workflow {
            model,
            id,
            action,
            args,
        } => {
            let additional = match args {
                Some(raw) => match parse_json("--args", &raw)? {
                    Value::Array(items) => items,
                    _ => {
                        return Err(ApiError::Configuration(
                            "--args must be a JSON array".to_string(),
                        ))
                    }
                },
                None => Vec::new(),
            };
            let id = api.execute_workflow(id, &model, &action, &additional).await?;
            print_json(&serde_json::json!({ "id": id }))?;
        }

        Commands::Action {
            model,
            action,
            filters,
            compare_fields,
            require_field,
            require_value,
            expect_value,
        } => {
            let mut builder = ActionRequest::builder()
                .action(action)
                .model(model)
                .filters(parse_json("--filters", &filters)?)
                .compare_fields(compare_fields);

            builder = match (require_field, require_value) {
                (Some(field), Some(value)) => {
                    builder.validator(FieldEquals::new(field, loose_json(&value)))
                }
                _ => builder.validate_with(|_record: &Record| Verdict::pass("no precondition")),
            };
            builder = match expect_value {
                Some(value) => builder.comparator(FieldChanged::to(loose_json(&value))),
                None => builder.comparator(FieldChanged::new()),
            };

            let outcome = api.action_model_by_filters(&builder.build()?).await?;
            print_json(&outcome)?;
        }

        Commands::CheckConfig => {}
    }

    Ok(())
}

fn parse_json(flag: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw)
        .map_err(|e| ApiError::Configuration(format!("{} is not valid JSON: {}", flag, e)))
}

fn parse_record(raw: &str) -> Result<Record> {
    match parse_json("--values", raw)? {
        Value::Object(record) => Ok(record),
        _ => Err(ApiError::Configuration(
            "--values must be a JSON object".to_string(),
        )),
    }
}

/// JSON when it parses, otherwise the raw text as a string
fn loose_json(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::Configuration(format!("cannot render output: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}
