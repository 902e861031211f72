//! Training workflow: session state machine and status polling

pub mod controller;
pub mod status_poller;

pub use controller::{Notice, TrainingWorkflowController, WorkflowSnapshot};
pub use status_poller::{StatusPoller, StatusTick};
