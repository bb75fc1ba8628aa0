mod registry;
mod task;
mod worker;

pub(crate) use registry::{Registry, Removal, Snapshot};
pub(crate) use task::Task;
pub(crate) use worker::TopicWorker;
