//! HTTP boundary of the design service.
//!
//! | Method | Path | |
//! |--------|------|-|
//! | POST | `/api/design/jobs` | launch a step as a background job |
//! | GET | `/api/design/jobs/{job_id}?projectId=` | poll a job |
//! | POST | `/api/design/stream` | stream a step as server-sent events |
//! | POST | `/api/design/validate` | four-way validation of an overview |
//! | POST | `/api/design/extract-decisions` | sort a conversation's decisions |
//! | GET/PUT | `/api/projects/{project_id}/blobs/{key}` | project blobs |
//! | GET | `/healthz` | liveness |

mod error;
mod extract;
mod routes;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use blueprint_engine::DesignService;
use tokio::net::TcpListener;
use tracing::info;

pub use error::HttpError;
pub use extract::{CallerId, USER_HEADER};

/// Build the router over a running service.
pub fn router(service: Arc<DesignService>) -> Router {
    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/api/design/jobs", post(routes::launch))
        .route("/api/design/jobs/{job_id}", get(routes::poll))
        .route("/api/design/stream", post(routes::stream))
        .route("/api/design/validate", post(routes::validate))
        .route("/api/design/extract-decisions", post(routes::extract_decisions))
        .route(
            "/api/projects/{project_id}/blobs/{key}",
            get(routes::get_blob).put(routes::put_blob),
        )
        .with_state(service)
}

/// Serve until `shutdown` resolves, then stop accepting connections and
/// let in-flight requests finish.
pub async fn serve<F>(listener: TcpListener, service: Arc<DesignService>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Design server listening");
    }
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Design server stopped");
    Ok(())
}
