mod channel;
mod worker;

pub(crate) use worker::{spawn_runner_worker, WorkerOptions};
