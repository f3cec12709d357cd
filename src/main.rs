//! elktail - `tail -f` for Elasticsearch and Kibana.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use elktail::config::{resolve, ConfigError, ConfigStore, Overrides, SavedSettings};
use elktail::display;
use elktail::format::Formatter;
use elktail::search::ElasticClient;
use elktail::tail::{resolve_indices, Tail, TailError};
use elktail::tunnel::{SshTunnel, TunnelError, TunnelSpec, STARTUP_GRACE};

#[derive(Parser, Debug)]
#[command(
    name = "elktail",
    about = "Tail and follow log documents stored in Elasticsearch",
    version
)]
struct Cli {
    /// Query string terms; joined with spaces.
    #[arg(value_name = "QUERY")]
    terms: Vec<String>,

    /// Elasticsearch (or Kibana) URL.
    #[arg(long)]
    url: Option<String>,

    /// Extra HTTP header, curl style ("Name: value"). Repeatable.
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// PEM client certificate for TLS authentication.
    #[arg(long)]
    cert: Option<String>,

    /// PEM private key for TLS authentication.
    #[arg(long)]
    key: Option<String>,

    /// Keep polling for new documents.
    #[arg(short, long)]
    follow: bool,

    /// Regular expression selecting the indices to search.
    #[arg(short = 'i', long)]
    index_pattern: Option<String>,

    /// Separator between year, month and day in index names.
    #[arg(long)]
    index_date_separator: Option<String>,

    /// Field holding the document timestamp.
    #[arg(short = 't', long)]
    timestamp_field: Option<String>,

    /// Number of entries to show initially.
    #[arg(short = 'n', long = "lines")]
    initial_entries: Option<usize>,

    /// Only documents at or after this date (implies no follow).
    #[arg(short = 'a', long)]
    after: Option<String>,

    /// Only documents before this date (implies no follow).
    #[arg(short = 'b', long)]
    before: Option<String>,

    /// Output template; %field.path is replaced by document values.
    #[arg(short = 'F', long)]
    format: Option<String>,

    /// Print documents as raw JSON.
    #[arg(short = 'r', long)]
    raw: bool,

    /// Save the query terms as the default.
    #[arg(short = 's', long = "save")]
    save_query: bool,

    /// Credentials as user:password.
    #[arg(short = 'u', long)]
    user: Option<String>,

    /// SSH tunnel as [localport:][user@]sshhost[:sshport].
    #[arg(long = "ssh")]
    ssh_tunnel: Option<String>,

    /// Talk to Elasticsearch through a Kibana proxy.
    #[arg(long)]
    kibana: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl From<Cli> for Overrides {
    fn from(cli: Cli) -> Self {
        Self {
            url: cli.url,
            index_pattern: cli.index_pattern,
            timestamp_field: cli.timestamp_field,
            user: cli.user,
            ssh_tunnel: cli.ssh_tunnel,
            index_date_separator: cli.index_date_separator,
            headers: cli.headers,
            cert: cli.cert,
            key: cli.key,
            kibana: cli.kibana,
            follow: cli.follow,
            initial_entries: cli.initial_entries,
            after: cli.after,
            before: cli.before,
            format: cli.format,
            raw: cli.raw,
            save_query: cli.save_query,
            verbosity: cli.verbose,
            terms: cli.terms,
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tunnel(#[from] TunnelError),
    #[error(transparent)]
    Tail(#[from] TailError),
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Saved defaults, unless connection settings were given on the command line.
fn load_saved(
    store: Option<&ConfigStore>,
    overrides: &Overrides,
) -> Result<Option<SavedSettings>, ConfigError> {
    if overrides.has_connection_settings() {
        return Ok(None);
    }
    let Some(store) = store else {
        tracing::info!("No configuration directory available");
        return Ok(None);
    };
    match store.load() {
        Err(e @ ConfigError::ReadError { .. }) => {
            tracing::info!(error = %e, "Ignoring unreadable configuration file");
            Ok(None)
        }
        other => other,
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let overrides = Overrides::from(cli);
    let store = ConfigStore::new();
    let saved = load_saved(store.as_ref(), &overrides)?;
    let resolved = resolve(overrides, saved);
    let mut config = resolved.config;

    let _tunnel = match &config.ssh_tunnel {
        Some(spec) => {
            let tunnel = SshTunnel::start(TunnelSpec::parse(spec)?, &config.search_target.url)?;
            config.search_target.tunnel_url = Some(tunnel.tunnel_url());
            tracing::trace!("Sleeping for a second until tunnel is established");
            tokio::time::sleep(STARTUP_GRACE).await;
            Some(tunnel)
        }
        None => None,
    };

    let client = ElasticClient::from_config(&config)?;
    let today = chrono::Local::now().date_naive();
    let indices = resolve_indices(
        &client,
        &config.search_target,
        &config.query_definition,
        today,
    )
    .await?;

    let formatter = Formatter::new(&config.query_definition.format, config.raw);
    let follow = !config.is_list_only();
    let mut tail = Tail::new(
        client,
        config.query_definition,
        indices,
        formatter,
        config.initial_entries,
    );

    if let Some(store) = &store {
        if let Err(e) = store.save(&resolved.to_save) {
            tracing::warn!(error = %e, "Failed to save configuration");
        }
    }

    tail.run(follow).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::print_fatal(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
