//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{availability, devices, events, health, tickets};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Equiptrack API",
        version = "1.0.0",
        description = "Equipment Borrow-Return Tracking REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html"),
        contact(name = "Equiptrack Maintainers", email = "dev@equiptrack.io")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Devices & inventory
        devices::list_devices,
        devices::get_device,
        devices::get_device_flow,
        devices::create_device,
        devices::add_unit,
        devices::retire_unit,
        devices::start_repair,
        devices::complete_repair,
        devices::unit_history,
        devices::repair_history,
        // Tickets
        tickets::create_ticket,
        tickets::get_ticket,
        tickets::list_my_tickets,
        tickets::approver_inbox,
        tickets::act_on_stage,
        tickets::pickup,
        tickets::complete_ticket,
        tickets::ticket_history,
        // Availability
        availability::device_availability,
        availability::check_units,
        // Events
        events::stream_events,
    ),
    components(
        schemas(
            // Devices
            crate::models::device::Device,
            crate::models::device::DeviceUnit,
            crate::models::device::DeviceDetails,
            crate::models::device::DeviceAvailability,
            crate::models::device::CreateDevice,
            crate::models::device::CreateDeviceUnit,
            crate::models::flow::CreateFlowStep,
            crate::models::flow::StageSpec,
            devices::RepairRequest,
            // Tickets
            crate::models::ticket::Ticket,
            crate::models::ticket::TicketStage,
            crate::models::ticket::TicketDetails,
            crate::models::ticket::CreateTicket,
            crate::models::ticket::ActOnStage,
            crate::models::ticket::StageDecision,
            crate::models::ticket::CompleteTicket,
            crate::models::ticket::ReturnedUnit,
            crate::models::ticket::ReturnCondition,
            tickets::PickupResponse,
            // Availability
            crate::models::availability::AvailabilityRecord,
            crate::models::availability::BorrowWindow,
            availability::CheckAvailabilityRequest,
            availability::CheckAvailabilityResponse,
            // Audit
            crate::models::audit::TicketAuditEntry,
            crate::models::audit::UnitAuditEntry,
            crate::models::audit::RepairAuditEntry,
            // Enums
            crate::models::enums::UnitStatus,
            crate::models::enums::TicketStatus,
            crate::models::enums::StageStatus,
            crate::models::enums::AvailabilityStatus,
            crate::models::enums::LifecycleStatus,
            crate::models::enums::Role,
            // Events
            crate::services::events::StageRouting,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "devices", description = "Device and inventory administration"),
        (name = "tickets", description = "Borrow-return ticket lifecycle"),
        (name = "availability", description = "Device availability queries"),
        (name = "events", description = "Outbound engine events")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
