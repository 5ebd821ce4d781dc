//! mimir-writer - Mimir write-path node controller
//!
//! Renders configuration, dry-runs reconciliation against an in-memory
//! supervisor, and talks to a running Mimir's ruler and Alertmanager APIs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use mimir_alerts::{AlertingConfiguration, RuleClient, RuleFile, DEFAULT_TENANT};
use mimir_config::{CharmSettings, MIMIR_CONFIG_FILE};
use mimir_writer::{
    DeploymentProfile, Event, FakeSupervisor, ModelSnapshot, PeerDirectory, ReconcileLoop,
    StaticModel, Supervisor, UnitModel, WorkloadController,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "mimir-writer")]
#[command(about = "Mimir write-path node controller")]
#[command(version)]
struct Cli {
    /// Mimir API base URL
    #[arg(long, global = true, env = "MIMIR_URL", default_value = "http://localhost:9009")]
    url: String,

    /// Tenant for rule operations
    #[arg(long, global = true, default_value = DEFAULT_TENANT)]
    tenant: String,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value_t = 10)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the Mimir configuration for a unit model
    RenderConfig {
        /// Unit model snapshot (JSON); defaults to a lone unit
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Local address (defaults to system hostname)
        #[arg(long)]
        address: Option<String>,
    },

    /// Handle one event against an in-memory supervisor and print the result
    Reconcile {
        /// workload-ready, config-changed or peer-relation-changed
        event: Event,

        /// Unit model snapshot (JSON); defaults to a lone unit
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Local address (defaults to system hostname)
        #[arg(long)]
        address: Option<String>,

        /// writer or monolithic
        #[arg(long, default_value = "writer")]
        profile: DeploymentProfile,
    },

    /// Manage ruler rule groups
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    /// Print currently firing alerts
    Alerts,

    /// Manage the Alertmanager configuration
    AlertingConfig {
        #[command(subcommand)]
        action: AlertingAction,
    },
}

#[derive(Subcommand)]
enum RulesAction {
    /// List rule groups of every tenant
    List,

    /// Push every group in a rule file
    Set {
        /// Rule file with a top-level `groups` list
        file: PathBuf,
    },

    /// Delete a rule group
    Delete {
        /// Group name
        name: String,
    },
}

#[derive(Subcommand)]
enum AlertingAction {
    /// Push the Alertmanager configuration built from operator settings
    Push {
        /// Operator settings (JSON); defaults are used when omitted
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("mimir_writer=info".parse()?))
        .init();

    let cli = Cli::parse();
    let client = RuleClient::new(&cli.url)
        .with_tenant(&cli.tenant)
        .with_timeout(Duration::from_secs(cli.timeout_secs));

    match cli.command {
        Commands::RenderConfig { model, address } => {
            render_config(model.as_deref(), address)?;
        }

        Commands::Reconcile {
            event,
            model,
            address,
            profile,
        } => {
            reconcile(event, model.as_deref(), address, profile, client).await?;
        }

        Commands::Rules { action } => match action {
            RulesAction::List => rules_list(&client).await?,
            RulesAction::Set { file } => rules_set(&client, &file).await?,
            RulesAction::Delete { name } => rules_delete(&client, &name).await?,
        },

        Commands::Alerts => {
            let alerts = client.get_active_alerts().await;
            println!("{}", serde_json::to_string_pretty(&alerts)?);
        }

        Commands::AlertingConfig {
            action: AlertingAction::Push { settings },
        } => {
            alerting_push(&client, settings.as_deref()).await?;
        }
    }

    Ok(())
}

fn load_model(path: Option<&Path>) -> anyhow::Result<StaticModel> {
    match path {
        Some(path) => {
            info!(model = %path.display(), "loading unit model");
            Ok(StaticModel::from_file(path)?)
        }
        None => Ok(StaticModel::new(ModelSnapshot::default())),
    }
}

fn peer_directory(model: &StaticModel, address: Option<String>) -> PeerDirectory {
    match address {
        Some(address) => PeerDirectory::new(model.unit_name(), address),
        None => PeerDirectory::detect(model.unit_name()),
    }
}

fn render_config(model: Option<&Path>, address: Option<String>) -> anyhow::Result<()> {
    let model = load_model(model)?;
    let directory = peer_directory(&model, address);

    let settings = model.settings().parse()?;
    let relation = model.peer_relation();
    let peers = directory.resolve_peers(relation.as_deref());
    let document = mimir_config::build(&settings, &peers);

    print!("{}", document.to_yaml()?);
    Ok(())
}

async fn reconcile(
    event: Event,
    model: Option<&Path>,
    address: Option<String>,
    profile: DeploymentProfile,
    client: RuleClient,
) -> anyhow::Result<()> {
    let model = Arc::new(load_model(model)?);
    let directory = peer_directory(&model, address);
    let supervisor = Arc::new(FakeSupervisor::new());

    let mut reconciler = ReconcileLoop::new(
        Arc::clone(&model) as Arc<dyn UnitModel>,
        directory,
        WorkloadController::new(Arc::clone(&supervisor) as Arc<dyn Supervisor>),
        client,
    )
    .with_profile(profile);

    // A dry run of a later event still needs the service defined.
    if event != Event::WorkloadReady {
        reconciler.handle(Event::WorkloadReady).await;
        supervisor.clear_calls();
    }

    let outcome = reconciler.handle(event).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    for call in supervisor.calls() {
        println!("# {call:?}");
    }
    if let Some(config) = supervisor.file(MIMIR_CONFIG_FILE) {
        println!("# {MIMIR_CONFIG_FILE}");
        print!("{config}");
    }
    Ok(())
}

async fn rules_list(client: &RuleClient) -> anyhow::Result<()> {
    let groups = client.get_rule_groups().await;
    if groups.is_empty() {
        warn!(url = client.base_url(), "no rule groups returned");
        return Ok(());
    }
    print!("{}", serde_yaml::to_string(&groups)?);
    Ok(())
}

async fn rules_set(client: &RuleClient, file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)?;
    let rules = RuleFile::from_yaml(&content)?;

    let mut failed = 0usize;
    for group in &rules.groups {
        group.validate()?;
        match client.set_rule_group(group).await {
            Ok(status) => info!(group = %group.name, status, "rule group pushed"),
            Err(e) => {
                error!(group = %group.name, error = %e, "failed to push rule group");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} rule groups failed to push", rules.groups.len());
    }
    Ok(())
}

async fn rules_delete(client: &RuleClient, name: &str) -> anyhow::Result<()> {
    let status = client.delete_rule_group(name).await?;
    info!(group = name, status, "rule group deleted");
    Ok(())
}

async fn alerting_push(client: &RuleClient, settings: Option<&Path>) -> anyhow::Result<()> {
    let settings = match settings {
        Some(path) => CharmSettings::from_file(path)?,
        None => CharmSettings::default(),
    };
    let config = AlertingConfiguration::from_operator(
        settings.alertmanager_config.as_deref(),
        settings.alertmanager_templates.as_deref(),
    )?;

    let status = client.set_alerting_config(&config).await?;
    info!(status, "alerting configuration pushed");
    Ok(())
}
