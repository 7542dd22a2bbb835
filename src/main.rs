use dotenvy::dotenv;
use tracing::info;

use ponto_billing::infra::{
    app::create_app,
    billing_scheduler::run_billing_loop,
    setup::{init_app_state, init_tracing},
};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let app_state = init_app_state().await?;

    let bind_addr = app_state.config.bind_addr;
    let interval = app_state.config.billing_task_interval;

    let app = create_app(app_state.clone());

    let billing = app_state.billing.clone();
    tokio::spawn(async move {
        run_billing_loop(billing, interval).await;
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Billing service listening at {}", &listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
