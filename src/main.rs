//! GPT Bot Router - Entry Point

use gptbot_router::Config;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("GPT Bot Router v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: gptbot-router");
        println!();
        println!("Options:");
        println!("  --help, -h         Show this help");
        println!();
        println!("Environment variables:");
        println!("  TELEGRAM_BOT_TOKEN       Telegram bot token (required)");
        println!("  COMPLETIONS_URL          Completion backend (default: http://localhost:8080)");
        println!("  TOKENIZE_URL             Token accounting backend (default: http://localhost:8081)");
        println!("  BACKEND_API_KEY          Bearer token for both backends");
        println!("  COMPLETION_TIMEOUT_SECS  Completion timeout (default: 120)");
        println!("  UI_SETTLE_DELAY_MS       Delay before deleting transient messages (default: 500)");
        println!("  MEMBERSHIP_CHANNEL       Channel users must join (@name or id)");
        println!("  REQUIRE_AGREEMENT        Ask for consent before first use (default: true)");
        println!("  SESSION_DB_PATH          SQLite file for selections (default: in memory)");
        println!("  RUST_LOG                 trace|debug|info|warn|error (default: debug)");
        println!("  BOT_LOG_FORMAT           Set to 'json' for JSON logs");
        return Ok(());
    }

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::DEBUG);

    let json_logs = std::env::var("BOT_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("GPT Bot Router v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    gptbot_router::telegram::run_telegram_bot(config).await?;

    Ok(())
}
