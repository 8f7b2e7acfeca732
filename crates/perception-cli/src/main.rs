mod report;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "perception-cli")]
#[command(about = "One-shot perception metrics for a single entity")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compute the metrics snapshot for an entity and print it as JSON.
    Snapshot {
        #[command(flatten)]
        entity: EntityArgs,
    },
    /// Print the competitor or citation ranking for an entity as JSON.
    Rankings {
        #[command(flatten)]
        entity: EntityArgs,
        #[arg(long, value_enum, default_value_t = RankingKind::Competitors)]
        kind: RankingKind,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Debug, Args, PartialEq, Eq)]
struct EntityArgs {
    #[arg(long, env = "PERCEPTION_ENTITY_ID")]
    entity_id: Uuid,
    #[arg(long, env = "PERCEPTION_ENTITY_NAME")]
    entity_name: String,
    /// Print compact single-line JSON.
    #[arg(long)]
    compact: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RankingKind {
    Competitors,
    Citations,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = perception_core::load_engine_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let output = match cli.command {
        Commands::Snapshot { entity } => {
            let snapshot = report::snapshot(&config, &entity).await?;
            render(&snapshot, entity.compact)?
        }
        Commands::Rankings {
            entity,
            kind,
            limit,
        } => match kind {
            RankingKind::Competitors => {
                let mut ranks = report::competitors(&config, &entity).await?;
                ranks.truncate(limit);
                render(&ranks, entity.compact)?
            }
            RankingKind::Citations => {
                let mut ranks = report::citations(&config, &entity).await?;
                ranks.truncate(limit);
                render(&ranks, entity.compact)?
            }
        },
    };
    println!("{output}");

    Ok(())
}

fn render<T: serde::Serialize>(value: &T, compact: bool) -> anyhow::Result<String> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    Ok(json)
}
