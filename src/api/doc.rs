//! OpenAPI document for the REST API.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::handlers::{auth, billing, catalog, events, guest, system, voters};
use crate::error::{ErrorBody, ErrorResponse};

/// Registers the bearer session scheme used by admin and voter routes.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .description(Some(
                        "Session token from /api/auth/login, /api/auth/signup or guest authentication.",
                    ))
                    .build(),
            ),
        );
    }
}

/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(Debug, OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Bright4Event API",
        description = "Event check-in, live audience voting and results."
    ),
    paths(
        system::health_handler,
        system::packages_handler,
        auth::signup,
        auth::login,
        auth::logout,
        auth::me,
        auth::change_password,
        auth::list_notifications,
        auth::mark_notification_read,
        billing::list_subscriptions,
        billing::create_subscription,
        billing::get_subscription,
        billing::update_subscription,
        billing::cancel_subscription,
        billing::list_invoices,
        billing::pay_invoice,
        events::create_event,
        events::list_events,
        events::get_event,
        events::update_event,
        events::delete_event,
        events::upsert_module,
        events::remove_module,
        events::get_results,
        catalog::list_categories,
        catalog::create_category,
        catalog::update_category,
        catalog::delete_category,
        catalog::list_candidates,
        catalog::create_candidate,
        catalog::update_candidate,
        catalog::delete_candidate,
        voters::list_voters,
        voters::import_guests,
        voters::check_in_voter,
        guest::event_info,
        guest::authenticate,
        guest::verify_otp,
        guest::check_in,
        guest::live_tally,
        guest::get_ballot,
        guest::submit_ballot,
        guest::my_votes,
        guest::voter_logout,
    ),
    components(schemas(ErrorResponse, ErrorBody)),
    tags(
        (name = "System", description = "Health and catalog"),
        (name = "Auth", description = "Organizer accounts and notifications"),
        (name = "Billing", description = "Subscriptions and invoices"),
        (name = "Events", description = "Event management and results"),
        (name = "Catalog", description = "Award categories and candidates"),
        (name = "Guests", description = "Guest list, authentication and check-in"),
        (name = "Voting", description = "Ballots for signed-in guests"),
    )
)]
pub struct ApiDoc;
