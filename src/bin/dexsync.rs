use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use dexsync::app::App;
use dexsync::config::{ConfigLoader, ResolvedConfig};
use dexsync::domain::{DexId, PokemonKey};
use dexsync::error::DexError;
use dexsync::output::JsonOutput;
use dexsync::pokeapi::PokeApiHttpClient;
use dexsync::store::RecordStore;

#[derive(Parser)]
#[command(name = "dexsync")]
#[command(about = "Local Pokédex cache synchronized with PokeAPI")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Get one Pokémon by dex number or name")]
    Get { key: String },
    #[command(about = "Get several Pokémon by dex number")]
    Batch { ids: Vec<String> },
    #[command(about = "List a page of the dex")]
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    #[command(about = "Get a nature by id")]
    Nature { id: String },
    #[command(about = "Get an item by id")]
    Item { id: String },
    #[command(about = "Clear the local cache")]
    Clear,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(dex) = report.downcast_ref::<DexError>() {
            return ExitCode::from(map_exit_code(dex));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DexError) -> u8 {
    match error {
        DexError::PokemonNotFound(_) => 2,
        DexError::UpstreamTransient(_)
        | DexError::UpstreamHttp(_)
        | DexError::UpstreamStatus { .. }
        | DexError::UpstreamDecode(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let resolved = ConfigLoader::resolve(cli.config.as_deref()).into_diagnostic()?;
    let store = RecordStore::load_snapshot(&resolved.snapshot_path).into_diagnostic()?;
    let client =
        PokeApiHttpClient::with_settings(&resolved.base_url, resolved.timeout, resolved.retry)
            .into_diagnostic()?;
    let app = App::new(store, client);

    run_command(cli.command, &app, &resolved)
}

fn run_command(
    command: Commands,
    app: &App<PokeApiHttpClient>,
    resolved: &ResolvedConfig,
) -> miette::Result<()> {
    match command {
        Commands::Get { key } => {
            let key: PokemonKey = key.parse().into_diagnostic()?;
            let record = app.get_or_refresh_key(&key).into_diagnostic()?;
            save(app, resolved)?;
            JsonOutput::print_record(&record).into_diagnostic()
        }
        Commands::Batch { ids } => {
            let ids = ids
                .iter()
                .map(|raw| raw.parse::<DexId>())
                .collect::<Result<Vec<_>, _>>()
                .into_diagnostic()?;
            let records = app.batch_get(&ids).into_diagnostic()?;
            save(app, resolved)?;
            JsonOutput::print_records(&records).into_diagnostic()
        }
        Commands::List { page, limit } => {
            let records = app.list(page, limit).into_diagnostic()?;
            save(app, resolved)?;
            JsonOutput::print_records(&records).into_diagnostic()
        }
        Commands::Nature { id } => {
            let id: DexId = id.parse().into_diagnostic()?;
            let nature = app.nature(id).into_diagnostic()?;
            save(app, resolved)?;
            JsonOutput::print_nature(&nature).into_diagnostic()
        }
        Commands::Item { id } => {
            let id: DexId = id.parse().into_diagnostic()?;
            let item = app.item(id).into_diagnostic()?;
            save(app, resolved)?;
            JsonOutput::print_item(&item).into_diagnostic()
        }
        Commands::Clear => {
            let result = app.clear();
            save(app, resolved)?;
            JsonOutput::print_clear(&result).into_diagnostic()
        }
    }
}

fn save(app: &App<PokeApiHttpClient>, resolved: &ResolvedConfig) -> miette::Result<()> {
    app.store()
        .save_snapshot(&resolved.snapshot_path)
        .into_diagnostic()
}
