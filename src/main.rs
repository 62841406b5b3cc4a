use pollbot::bot::{Bot, HandlerResult, HandlerSink};
use pollbot::config::{self, PollbotConfig};
use pollbot::transport::{HttpTransport, TransportError};
use log::{info, warn};
use serde_json::Value;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Context;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::util::SubscriberInitExt;


fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg = config::load(&args.config)?;
    let _guard = boot(&cfg)?;
    enable_panic_hook();

    let token = cfg.telegram.resolve_token()?;
    let transport = HttpTransport::new(&cfg.telegram, &token).context("failed to build transport")?;
    let bot = Bot::new(Arc::new(transport), Arc::new(LogSink), cfg.poll.clone());

    let poller = bot.start_async()?;
    info!("[main] pollbot started, long-poll timeout {}s", cfg.poll.timeout);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(async {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        loop {
            tokio::select! {
                res = &mut ctrl_c => {
                    if let Err(err) = res {
                        warn!("[main] failed to listen for ctrl-c: {}", err);
                    }
                    break;
                }
                _ = tokio::time::sleep(Duration::from_secs(1)) => {
                    if poller.is_finished() {
                        break;
                    }
                }
            }
        }
    });

    match bot.stop() {
        Ok(()) => info!("[main] waiting for the current poll to return"),
        Err(err) => info!("[main] {}", err),
    }
    if poller.join().is_err() {
        warn!("[main] poller thread panicked");
    }
    let stats = bot.stats();
    info!(
        "[main] bye: {} fetches, {} updates, {} fetch failures, {} handler failures",
        stats.fetches, stats.updates, stats.fetch_failures, stats.handler_failures
    );
    Ok(())
}


#[derive(Debug, Parser)]
#[command(version, about = "pollbot")]
struct Args {
    #[clap(short, long, default_value = "config/pollbot.toml")]
    pub config: PathBuf,
}

/// Logs every update it sees; `/shutdown` stops the bot.
struct LogSink;

impl HandlerSink for LogSink {
    fn on_message(&self, bot: &Bot, update_id: i64, message: &Value) -> HandlerResult {
        let chat_id = message.pointer("/chat/id").and_then(Value::as_i64);
        let text = message.get("text").and_then(Value::as_str).unwrap_or_default();
        info!("[bot] update {} message chat={:?}: {}", update_id, chat_id, text);
        if text.trim() == "/shutdown" {
            bot.stop()?;
        }
        Ok(())
    }

    fn on_edited_message(&self, _bot: &Bot, update_id: i64, message: &Value) -> HandlerResult {
        info!("[bot] update {} edited message {:?}", update_id, message.get("message_id"));
        Ok(())
    }

    fn on_inline_query(&self, _bot: &Bot, update_id: i64, query: &Value) -> HandlerResult {
        info!("[bot] update {} inline query {:?}", update_id, query.get("query"));
        Ok(())
    }

    fn on_chosen_inline_result(&self, _bot: &Bot, update_id: i64, result: &Value) -> HandlerResult {
        info!("[bot] update {} chosen inline result {:?}", update_id, result.get("result_id"));
        Ok(())
    }

    fn on_callback_query(&self, _bot: &Bot, update_id: i64, query: &Value) -> HandlerResult {
        info!("[bot] update {} callback query {:?}", update_id, query.get("data"));
        Ok(())
    }

    fn on_fetch_failure(&self, _bot: &Bot, error: &TransportError) {
        warn!("[bot] fetch failed: {}", error);
    }
}

fn boot(cfg: &PollbotConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let Some(dir) = cfg.log.dir.as_ref() else {
        pretty_env_logger::try_init().context("failed to init logger")?;
        return Ok(None);
    };

    let file_appender = tracing_appender::rolling::daily(dir, &cfg.log.file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_max_level(tracing::level_filters::LevelFilter::INFO)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_writer(non_blocking)
        .finish()
        .try_init()
        .context("failed to init tracing subscriber")?;

    Ok(Some(guard))
}

/// Logs panics before the default hook runs. Handler panics are contained by the
/// dispatcher, so this must not exit the process.
pub fn enable_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        if let Some(location) = panic_info.location() {
            warn!(
                "panic occurred location in file '{}' at line {}",
                location.file(),
                location.line()
            );
        }
        if let Some(payload) = panic_info.payload().downcast_ref::<&str>() {
            warn!("panic occurred payload: {}", payload);
        }
        default_hook(panic_info);
    }));
}
