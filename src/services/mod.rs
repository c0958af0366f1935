//! Business logic services

pub mod availability;
pub mod devices;
pub mod events;
pub mod flows;
pub mod scheduler;
pub mod tickets;

use crate::repository::Repository;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub flows: flows::FlowsService,
    pub tickets: tickets::TicketsService,
    pub availability: availability::AvailabilityService,
    pub devices: devices::DevicesService,
    pub events: events::EventPublisher,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, events: events::EventPublisher) -> Self {
        Self {
            flows: flows::FlowsService::new(repository.clone()),
            tickets: tickets::TicketsService::new(repository.clone(), events.clone()),
            availability: availability::AvailabilityService::new(repository.clone()),
            devices: devices::DevicesService::new(repository),
            events,
        }
    }
}
