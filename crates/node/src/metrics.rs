use std::net::SocketAddr;

use axum::{routing::get, Router};
use once_cell::sync::Lazy;
use prometheus::{register_int_counter, Encoder, IntCounter, TextEncoder};

pub static PROOFS_VERIFIED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("skein_proofs_verified_total", "Proofs verified and applied")
        .expect("metric")
});

pub static PROOFS_REJECTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("skein_proofs_rejected_total", "Proofs rejected").expect("metric")
});

pub static TRANSACTIONS_SENT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("skein_transactions_sent_total", "Transactions sent").expect("metric")
});

pub static BLOCKS_APPENDED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "skein_blocks_appended_total",
        "Blocks appended to local chains"
    )
    .expect("metric")
});

async fn health_handler() -> &'static str {
    "ok"
}

async fn metrics_handler() -> (axum::http::StatusCode, String) {
    let families = prometheus::gather();
    let mut buf = Vec::new();
    if TextEncoder::new().encode(&families, &mut buf).is_err() {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            String::new(),
        );
    }
    (
        axum::http::StatusCode::OK,
        String::from_utf8_lossy(&buf).into_owned(),
    )
}

pub async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let router = Router::new()
        .route("/healthz", get(health_handler))
        .route("/metrics", get(metrics_handler));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("metrics listening on {addr}");
    axum::serve(listener, router).await?;
    Ok(())
}
