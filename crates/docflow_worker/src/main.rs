use std::process::ExitCode;

use docflow_store::{RunOutcome, open_store_from_env};
use docflow_worker::{LogHandle, LogSettings, Worker, WorkerSettings, log_error};

#[tokio::main]
async fn main() -> ExitCode {
    let logs = match LogSettings::from_env().and_then(LogHandle::init) {
        Ok(handle) => Some(handle),
        Err(err) => {
            eprintln!("docflow-worker: logging disabled: {err}");
            None
        }
    };

    let outcome = run_once().await;
    println!("Document processing result: {}", outcome.succeeded());

    if let Some(logs) = logs {
        logs.shutdown();
    }
    ExitCode::from(outcome.exit_code())
}

async fn run_once() -> RunOutcome {
    let settings = match WorkerSettings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            log_error("worker: invalid settings", &err);
            return RunOutcome::Failed(err);
        }
    };
    let store = match open_store_from_env().await {
        Ok(store) => store,
        Err(err) => {
            log_error("worker: store unavailable", &err);
            return RunOutcome::Failed(err);
        }
    };
    Worker::new(store, settings).process_document().await
}
