use chrono::Utc;

use crate::bootstrap::conversation_store;
use crate::commands::{build_runtime, load_config, CommandResult};
use crate::init_logging;

pub fn run() -> CommandResult {
    let config = match load_config("cleanup") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    init_logging(&config.logging);

    let runtime = match build_runtime("cleanup") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let store = conversation_store(&config);
    match runtime.block_on(store.cleanup_expired(Utc::now())) {
        Ok(evicted) => CommandResult::success(
            "cleanup",
            format!("evicted {} expired conversations", evicted.len()),
        ),
        Err(error) => CommandResult::failure("cleanup", "persistence", error.to_string(), 4),
    }
}
