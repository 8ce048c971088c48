use clap::{Args, Parser, Subcommand, ValueEnum};
use oxtask_client::{ApiClient, ClientConfig};
use oxtask_core::{ApiToken, CoreError, ModuleArgs, ModuleResult};
use oxtask_reconcile::{execute, ModuleName, ModuleParams, ReconcileError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(
    name = "oxtask",
    version,
    about = "Declarative tasks for Oxide cloud resources"
)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one module against a YAML or JSON parameters file
    Run {
        /// Module name, e.g. oxide_disk or disk
        module: String,
        /// Path to the parameters file
        params_file: PathBuf,
        /// Report what would change without writing anything
        #[arg(long)]
        check: bool,
    },
    /// List the available modules
    Modules,
}

/// Invocation as an Ansible binary module: `oxide_<kind> <args-file>`
#[derive(Parser)]
#[command(about = "Ansible binary module for Oxide cloud resources")]
struct ModuleCli {
    /// Path of the JSON arguments file written by Ansible
    args_file: PathBuf,

    #[command(flatten)]
    connection: ConnectionArgs,
}

/// Fallback connection settings for tasks that omit oxide_host / oxide_token
#[derive(Args, Clone, Default)]
struct ConnectionArgs {
    /// Oxide API base URL
    #[arg(long, env = "OXIDE_HOST", global = true)]
    host: Option<String>,

    /// Oxide API token
    #[arg(long, env = "OXIDE_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let argv: Vec<OsString> = std::env::args_os().collect();

    if let Some(module) = argv.first().and_then(|a| module_from_argv0(Path::new(a))) {
        let cli = ModuleCli::parse_from(&argv);
        init_tracing(cli.connection.log_format);
        let result = invoke_file(module, &cli.args_file, false, &cli.connection).await;
        return emit(&result);
    }

    let cli = Cli::parse_from(&argv);
    init_tracing(cli.connection.log_format);

    match cli.command {
        Commands::Run {
            module,
            params_file,
            check,
        } => {
            let module = match module.parse::<ModuleName>() {
                Ok(m) => m,
                Err(e) => {
                    let result = render_failure(e.into());
                    return emit(&result);
                }
            };
            let result = invoke_file(module, &params_file, check, &cli.connection).await;
            emit(&result)
        }
        Commands::Modules => {
            for module in ModuleName::ALL {
                println!("{}", module);
            }
            ExitCode::SUCCESS
        }
    }
}

/// Logs go to stderr: stdout is reserved for the result document
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

/// Module name from the executable name, for the Ansible binary module protocol
fn module_from_argv0(program: &Path) -> Option<ModuleName> {
    let stem = program.file_stem()?.to_str()?;
    if !stem.starts_with("oxide_") {
        return None;
    }
    stem.parse().ok()
}

/// Read an arguments file and run the module, always producing a result
async fn invoke_file(
    module: ModuleName,
    path: &Path,
    check: bool,
    connection: &ConnectionArgs,
) -> ModuleResult {
    let args = match load_args(path) {
        Ok(args) => args,
        Err(e) => return render_failure(e.into()),
    };

    match run_module(module, args, check, connection).await {
        Ok(result) => result,
        Err(e) => render_failure(e),
    }
}

fn load_args(path: &Path) -> oxtask_core::Result<ModuleArgs> {
    debug!("Reading module arguments from {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|e| {
        CoreError::serialization_error(
            format!("Failed to read arguments file {}: {}", path.display(), e),
            Some(Box::new(e)),
        )
    })?;
    ModuleArgs::parse(&text)
}

async fn run_module(
    module: ModuleName,
    args: ModuleArgs,
    check: bool,
    connection: &ConnectionArgs,
) -> oxtask_reconcile::Result<ModuleResult> {
    let check_mode = check || args.check_mode;
    let params = ModuleParams::parse(module, args.params)?;
    let request = params.request()?;

    let fallback_token = connection.token.as_deref().map(ApiToken::new);
    let config = ClientConfig::resolve(
        params.oxide_host(),
        params.oxide_token(),
        connection.host.as_deref(),
        fallback_token.as_ref(),
    )?;
    let client = ApiClient::new(&config)?;

    info!(module = %module, host = %config.host, check_mode, "Running module");
    execute(Arc::new(client), request, check_mode).await
}

/// Turn an error into a failed result, logging the full diagnostic to stderr
fn render_failure(err: ReconcileError) -> ModuleResult {
    let msg = err.to_string();
    let response = err.response_body().cloned();
    eprintln!("{:?}", miette::Report::new(err));
    ModuleResult::failure(msg, response)
}

/// Print the result document and map it to the process exit status
fn emit(result: &ModuleResult) -> ExitCode {
    match oxtask_core::to_json(result) {
        Ok(json) => println!("{}", json),
        Err(e) => println!(
            "{}",
            serde_json::json!({ "failed": true, "changed": false, "msg": e.to_string() })
        ),
    }

    if result.failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
