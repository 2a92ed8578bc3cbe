use construkt_agent::TurnResult;
use serde::Serialize;

use crate::bootstrap::bootstrap;
use crate::commands::{build_runtime, load_config, CommandResult};
use crate::init_logging;

#[derive(Debug, Serialize)]
struct AskOutput {
    command: &'static str,
    status: &'static str,
    user_id: String,
    reply: String,
    turn: TurnResult,
}

pub fn run(user_id: &str, message: &str) -> CommandResult {
    let config = match load_config("ask") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    init_logging(&config.logging);

    if message.trim().is_empty() {
        return CommandResult::failure("ask", "bad_request", "message must not be empty", 2);
    }

    let runtime = match build_runtime("ask") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let app = bootstrap(config).await?;
        let turn = app.orchestrator.handle_message(user_id, message).await;
        let reply = app.orchestrator.reply_text(user_id, message, &turn).await;
        // The chat log insert runs on a spawned task; let it finish before exit.
        tokio::task::yield_now().await;
        app.db_pool.close().await;
        Ok::<_, crate::bootstrap::BootstrapError>(AskOutput {
            command: "ask",
            status: "ok",
            user_id: user_id.to_owned(),
            reply,
            turn,
        })
    });

    match result {
        Ok(output) => CommandResult::report(&output),
        Err(error) => {
            CommandResult::failure("ask", error.error_class(), error.to_string(), error.exit_code())
        }
    }
}
