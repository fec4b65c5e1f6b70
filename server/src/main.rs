use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use platform_authz::{GuardMode, Role};
use platform_db::{connect_url, directory, seed};
use platform_obs::{ObsConfig, init_tracing, shutdown_tracing};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use server::{
    auth::issue_token,
    config::AppConfig,
    graphql::build_schema,
    http::{self, AppState},
};
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "pharmachain-server", version, about = "PharmaChain role & permission service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the RPC + GraphQL server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Load the demo directory (facilities, one account per tier, products).
    Seed,
    /// Print the GraphQL schema in SDL.
    PrintSchema {
        #[arg(long, value_name = "FILE", help = "Destination file path")]
        output: Option<PathBuf>,
    },
    /// Mint a bearer token for a local account.
    IssueToken(IssueTokenCommand),
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, help = "Override BIND")]
    bind: Option<std::net::SocketAddr>,
    #[arg(long, help = "Allow starting even when migrations are pending")]
    allow_dirty: bool,
}

#[derive(Args, Debug)]
struct IssueTokenCommand {
    #[arg(long, conflicts_with = "user_id", required_unless_present = "user_id")]
    email: Option<String>,
    #[arg(long)]
    user_id: Option<Uuid>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    if let Command::PrintSchema { output } = &cli.command {
        return print_schema(output.clone());
    }

    let config = Arc::new(AppConfig::load()?);
    init_tracing(ObsConfig::default().with_otlp_endpoint(config.otlp_endpoint.clone()))?;
    let result = match cli.command {
        Command::Serve(cmd) => run_server(cmd, config).await,
        Command::Migrate(MigrateCommand::Up) => migrate_up(&config).await,
        Command::Migrate(MigrateCommand::Down) => migrate_down(&config).await,
        Command::Seed => run_seed(&config).await,
        Command::IssueToken(cmd) => run_issue_token(cmd, &config).await,
        Command::PrintSchema { .. } => Ok(()),
    };
    shutdown_tracing();
    result
}

async fn connect(config: &AppConfig) -> Result<DatabaseConnection> {
    connect_url(&config.database_url, 10, false)
        .await
        .context("failed to connect to DATABASE_URL")
}

async fn run_server(cmd: ServeCommand, config: Arc<AppConfig>) -> Result<()> {
    let db = connect(&config).await?;
    ensure_migrations(&db, cmd.allow_dirty).await?;
    if config.guard_mode == GuardMode::AuditOnly {
        tracing::warn!("role guards on read-only queries run in audit-only mode");
    }
    let db = Arc::new(db);
    let state = AppState {
        schema: build_schema(db.clone(), config.guard_mode),
        db,
        config: config.clone(),
    };
    http::serve(cmd.bind.unwrap_or(config.bind), state).await
}

async fn ensure_migrations(db: &DatabaseConnection, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(db).await?;
    if !pending.is_empty() && !allow_dirty {
        anyhow::bail!(
            "pending migrations detected; run `pharmachain-server migrate up` or pass --allow-dirty"
        );
    }
    Ok(())
}

async fn migrate_up(config: &AppConfig) -> Result<()> {
    let db = connect(config).await?;
    Migrator::up(&db, None).await?;
    info!("database migrations applied");
    Ok(())
}

async fn migrate_down(config: &AppConfig) -> Result<()> {
    let db = connect(config).await?;
    Migrator::down(&db, Some(1)).await?;
    info!("most recent migration rolled back");
    Ok(())
}

async fn run_seed(config: &AppConfig) -> Result<()> {
    let db = connect(config).await?;
    let seeded = seed::seed_demo(&db).await?;
    info!(
        national_id = %seeded.national_id,
        district_clinic_id = %seeded.district_clinic_id,
        "demo directory loaded"
    );
    Ok(())
}

async fn run_issue_token(cmd: IssueTokenCommand, config: &AppConfig) -> Result<()> {
    let db = connect(config).await?;
    let account = match (cmd.user_id, cmd.email) {
        (Some(user_id), _) => directory::find_user(&db, user_id).await?,
        (None, Some(email)) => {
            entity::user::Entity::find()
                .filter(entity::user::Column::Email.eq(email.trim().to_ascii_lowercase()))
                .one(&db)
                .await?
        }
        (None, None) => None,
    }
    .ok_or_else(|| anyhow!("no such account"))?;
    if !account.is_active {
        anyhow::bail!("account {} is inactive", account.email);
    }
    let role = Role::from_external(&account.role_code);
    let token = issue_token(account.id, role, &config.auth)?;
    info!(
        user_id = %account.id,
        %role,
        ttl_minutes = config.auth.token_ttl_minutes,
        "token issued"
    );
    println!("{token}");
    Ok(())
}

fn print_schema(path: Option<PathBuf>) -> Result<()> {
    // The schema only needs its types; resolvers never run here.
    let db = Arc::new(DatabaseConnection::Disconnected);
    let schema = build_schema(db, GuardMode::default());
    let sdl = schema.sdl();
    match path {
        Some(target) => {
            std::fs::write(&target, sdl)
                .with_context(|| format!("failed to write {}", target.display()))?;
            println!("schema written to {}", target.display());
        }
        None => print!("{sdl}"),
    }
    Ok(())
}
