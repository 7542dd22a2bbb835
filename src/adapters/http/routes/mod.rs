pub mod billing_tasks;
pub mod gateways;
pub mod health;
pub mod invoices;
pub mod payments;
pub mod webhooks;

use axum::{Router, middleware};

use crate::adapters::http::{app_state::AppState, middleware::require_admin_token};

/// Provider callbacks are public; everything else needs the admin token.
pub fn router(app_state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .nest("/invoices", invoices::router())
        .nest("/payments", payments::router())
        .nest("/gateways", gateways::router())
        .nest("/billing", billing_tasks::router())
        .merge(webhooks::admin_router())
        .route_layer(middleware::from_fn_with_state(app_state, require_admin_token));

    Router::new().merge(webhooks::router()).merge(admin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;

    use crate::test_utils::{TEST_ADMIN_TOKEN, TestAppStateBuilder, TestBilling};

    fn build_test_router(app_state: AppState) -> Router<()> {
        router(app_state.clone()).with_state(app_state)
    }

    #[tokio::test]
    async fn admin_routes_require_bearer_token() {
        let billing = TestBilling::new();
        let invoice = billing.seed_invoice(|_| {});
        let app_state = TestAppStateBuilder::new(&billing).build();
        let server = TestServer::new(build_test_router(app_state)).unwrap();

        let path = format!("/invoices/{}", invoice.id);
        server.get(&path).await.assert_status(StatusCode::UNAUTHORIZED);

        server
            .get(&path)
            .add_header("Authorization", "Bearer wrong-token")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        server
            .get(&path)
            .add_header("Authorization", format!("Bearer {TEST_ADMIN_TOKEN}"))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn webhook_route_is_public() {
        let billing = TestBilling::new();
        let app_state = TestAppStateBuilder::new(&billing).build();
        let server = TestServer::new(build_test_router(app_state)).unwrap();

        let response = server
            .post("/webhooks/asaas")
            .text(r#"{"id":"evt_1","event":"PAYMENT_CREATED","payment":{"id":"pay_x"}}"#)
            .await;
        response.assert_status_ok();
    }
}
