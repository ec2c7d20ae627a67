use std::path::Path;
use std::sync::Arc;

use miette::Result;
use tokio::sync::RwLock;
use warden::{
    CommandRegistry, Config, Dispatcher, JsonStore, PrefixOverrides, WardenBot, commands, config,
    gateway,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    config::load_dotenv();
    let config = Config::load()?;
    config.validate()?;

    let data_dir = Path::new(&config.bot.data_dir);
    let prefixes = Arc::new(RwLock::new(PrefixOverrides::load(
        data_dir,
        config.bot.prefix.clone(),
    )?));
    let warns = Arc::new(RwLock::new(JsonStore::load(data_dir.join("warns.json"))?));

    let registry = Arc::new(RwLock::new(CommandRegistry::new()));
    let dispatcher = Dispatcher::new(registry.clone());
    {
        let mut table = registry.write().await;
        for command in commands::builtin_commands(registry.clone(), prefixes.clone(), warns) {
            table.add_command(command, None)?;
        }
    }

    let handler = WardenBot::new(dispatcher, prefixes, config.bot.admin_users.clone());
    gateway::run_bot(&config, handler).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    std::fs::create_dir_all("logs").ok();

    let file_appender = tracing_appender::rolling::daily("logs", "warden.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer guard alive for the entire program.
    Box::leak(Box::new(guard));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warden=info,serenity=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_line_number(true)
                .with_ansi(false),
        )
        .init();
}
