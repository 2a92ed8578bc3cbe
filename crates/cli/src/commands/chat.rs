use std::sync::Arc;
use std::time::Duration;

use construkt_agent::{ConversationStateStore, DialogueOrchestrator};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::info;

use crate::bootstrap::bootstrap;
use crate::commands::{build_runtime, load_config, CommandResult};
use crate::init_logging;

const EXIT_WORDS: &[&str] = &["exit", "quit", "bye"];

pub fn run(user_id: &str) -> CommandResult {
    let config = match load_config("chat") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    init_logging(&config.logging);

    let runtime = match build_runtime("chat") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let app = bootstrap(config)
            .await
            .map_err(|error| (error.error_class(), error.to_string(), error.exit_code()))?;

        let sweeper = ConversationStateStore::spawn_cleanup(
            Arc::clone(app.orchestrator.state()),
            Duration::from_secs(app.config.conversation.cleanup_interval_secs.max(1)),
        );

        let input = BufReader::new(tokio::io::stdin());
        let mut output = tokio::io::stdout();
        let conversation = converse(&app.orchestrator, user_id, input, &mut output);
        let turns = tokio::select! {
            turns = conversation => turns.map_err(|error| ("io", error.to_string(), 1u8))?,
            _ = tokio::signal::ctrl_c() => {
                info!(event_name = "chat.interrupted", correlation_id = "chat", "chat interrupted");
                0
            }
        };

        sweeper.abort();
        app.db_pool.close().await;
        Ok::<usize, (&'static str, String, u8)>(turns)
    });

    match result {
        Ok(turns) => CommandResult::success("chat", format!("chat session ended after {turns} turns")),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}

/// Reads one message per line and writes each reply followed by a blank line.
/// Stops at end of input or an exit word; returns the number of turns handled.
pub async fn converse<R, W>(
    orchestrator: &DialogueOrchestrator,
    user_id: &str,
    input: R,
    output: &mut W,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut turns = 0;

    while let Some(line) = lines.next_line().await? {
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&message.to_lowercase().as_str()) {
            break;
        }

        let turn = orchestrator.handle_message(user_id, message).await;
        let reply = orchestrator.reply_text(user_id, message, &turn).await;
        output.write_all(reply.as_bytes()).await?;
        output.write_all(b"\n\n").await?;
        output.flush().await?;
        turns += 1;
    }

    Ok(turns)
}
