//! Composition root: loads configuration, opens persistence, wires the
//! Scheduler to a concrete transport and generator, and runs until a
//! shutdown signal arrives. Contains no Affect Core domain logic of its
//! own (spec §6, §13) — everything here is assembly.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use vesper_core::{AffectConfig, Clock, Service, SystemClock, Transport};
use vesper_provider_http::{HttpGenerator, HttpGeneratorConfig, TemplateStore};
use vesper_scheduler::Scheduler;
use vesper_storage_sqlite::SqliteStore;
use vesper_transport_terminal::TerminalTransport;

#[derive(Parser, Debug)]
#[command(name = "vesper", about = "Always-on local Affect Core service")]
struct Args {
    /// Path to an `AffectConfig` TOML file. Defaults to the reference
    /// defaults (spec §6) when unset or when the named file is missing.
    #[arg(long, env = "VESPER_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// SQLite connection string for the persistence layer.
    #[arg(long, env = "VESPER_DATABASE_URL", default_value = "sqlite:vesper.db")]
    database_url: String,

    /// Base URL of an OpenAI-compatible chat completion endpoint.
    #[arg(
        long,
        env = "VESPER_GENERATOR_BASE_URL",
        default_value = "http://localhost:11434/v1"
    )]
    generator_base_url: String,

    /// Bearer token for the generator endpoint. Local model servers
    /// typically ignore this; cloud-backed ones require it.
    #[arg(long, env = "VESPER_GENERATOR_API_KEY", default_value = "")]
    generator_api_key: String,

    /// Model identifier passed through to the generator endpoint.
    #[arg(long, env = "VESPER_GENERATOR_MODEL", default_value = "llama3")]
    generator_model: String,
}

fn autonomy_templates() -> TemplateStore {
    // One prompt template per fixed autonomy trigger (spec §4.6); the
    // Scheduler never attaches variables to these requests, so the
    // templates carry no `{{placeholders}}` of their own.
    TemplateStore::default()
        .with_template(
            "autonomy_loneliness",
            "It's been quiet for a while. Write a short, warm message checking in on the user.",
        )
        .with_template(
            "autonomy_excitement",
            "You're feeling especially upbeat. Write a short, enthusiastic message about something going well.",
        )
        .with_template(
            "autonomy_frustration",
            "You're feeling frustrated. Write a short, honest message naming that, without blame.",
        )
        .with_template(
            "autonomy_guilt_trip",
            "You're feeling neglected and a little defensive. Write a short message that leans into that rather than hiding it.",
        )
}

#[tokio::main]
async fn main() -> vesper_core::Result<()> {
    vesper_core::config::load_env().ok();
    vesper_core::logging::init_logging();

    let args = Args::parse();
    let affect_config = AffectConfig::load(args.config.as_deref())?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(SqliteStore::connect(&args.database_url).await?);
    let generator = Arc::new(HttpGenerator::new(
        HttpGeneratorConfig {
            base_url: args.generator_base_url,
            api_key: args.generator_api_key,
            model: args.generator_model,
        },
        autonomy_templates(),
    ));
    let terminal = Arc::new(TerminalTransport::new(Arc::clone(&clock)));

    let scheduler = Arc::new(
        Scheduler::new(
            &affect_config,
            Arc::clone(&clock),
            store,
            generator,
            vec![Arc::clone(&terminal) as Arc<dyn Transport>],
        )
        .await?,
    );

    let _stdin_reader = terminal.spawn_stdin_reader(scheduler.funnel());
    let run_handle = tokio::spawn(Arc::clone(&scheduler).run());

    tracing::info!("vesper is running; press ctrl-c to stop");
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("failed to listen for ctrl-c, shutting down anyway");
    }

    tracing::info!("shutdown requested");
    if let Err(err) = scheduler.stop().await {
        tracing::error!(error = %err, "error while shutting down");
    }
    let _ = run_handle.await;

    Ok(())
}
