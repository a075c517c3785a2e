mod closure;
mod enqueue;
mod read_api;
mod worker;

pub use closure::{close_listing, ClosureOutcome};
pub use enqueue::{enqueue, EnqueueOutcome};
pub use read_api::{get_task_status, simple_predict, PredictResult, TaskStatusView};
pub use worker::{handle_message, run_worker};
