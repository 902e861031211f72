//! leafy-client library interface
//!
//! Backend clients, the training workflow controller and the terminal
//! rendering used by the `leafy` binary. Exposed for integration testing.

pub mod error;
pub mod models;
pub mod render;
pub mod services;
pub mod transport;
pub mod workflow;

pub use crate::error::{TransportError, WorkflowError};

use leafy_common::config::ClientConfig;
use leafy_common::events::EventBus;
use services::{LabelRegistryClient, PredictionClient, TrainingClient};
use transport::Transport;
use workflow::TrainingWorkflowController;

/// Event bus capacity; the CLI is the only subscriber
const EVENT_BUS_CAPACITY: usize = 100;

/// Every client wired to one backend
#[derive(Clone)]
pub struct LeafyClient {
    pub transport: Transport,
    pub prediction: PredictionClient,
    pub labels: LabelRegistryClient,
    pub training: TrainingClient,
    pub workflow: TrainingWorkflowController,
    pub event_bus: EventBus,
}

impl LeafyClient {
    pub fn new(config: &ClientConfig) -> leafy_common::Result<Self> {
        let transport = Transport::new(config)?;
        let event_bus = EventBus::new(EVENT_BUS_CAPACITY);

        Ok(Self {
            prediction: PredictionClient::new(transport.clone()),
            labels: LabelRegistryClient::new(transport.clone()),
            training: TrainingClient::new(transport.clone()),
            workflow: TrainingWorkflowController::new(transport.clone(), config, event_bus.clone()),
            transport,
            event_bus,
        })
    }
}
