use crate::config::{Configuration, ServerConfiguration};
use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_webhook_signature::{BoxError, Error, SignatureBody, VerifiedBody, Verifier};

async fn webhook(VerifiedBody(body): VerifiedBody) -> StatusCode {
    info!(size = body.len(), "accepted webhook");
    StatusCode::OK
}

async fn handle_error(error: BoxError) -> Response {
    match error.downcast::<Error>() {
        Ok(error) => (*error).into_response(),
        Err(error) => {
            error!(%error, "webhook middleware failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn create_router(verifier: Verifier, server_config: &ServerConfiguration) -> Router {
    Router::new()
        .route("/webhook", post(webhook).get(webhook))
        .layer(DefaultBodyLimit::max(server_config.max_body_size))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_error))
                .layer(verifier.layer())
                .map_request(|req: Request<SignatureBody<Body>>| req.map(Body::new)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(verifier)
}

/// Serve webhooks until the token gets cancelled
///
/// In-flight requests are allowed to finish
#[instrument(skip_all, fields(port = %config.server.port))]
pub async fn run(config: Configuration, shutdown: CancellationToken) -> eyre::Result<()> {
    let verifier = Verifier::with_config(config.webhook.shared_key, config.webhook.verification);
    let router = create_router(verifier, &config.server);

    let listener = TcpListener::bind(("0.0.0.0", config.server.port)).await?;
    info!(address = %listener.local_addr()?, "listening for webhooks");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("webhook receiver stopped");

    Ok(())
}
