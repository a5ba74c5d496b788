use std::future::Future;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use crate::infra::error::InfraError;

/// How the listener stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    /// Every in-flight request finished inside the grace period.
    Drained,
    /// The grace period ran out and remaining connections were aborted.
    Forced,
}

/// Serve `router` until `stop` resolves, then give in-flight requests at most
/// `grace` to finish.
pub async fn serve_until<F>(
    listener: TcpListener,
    router: Router,
    stop: F,
    grace: Duration,
) -> Result<ServeOutcome, InfraError>
where
    F: Future<Output = ()>,
{
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server: JoinHandle<std::io::Result<()>> = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        joined = &mut server => return server_outcome(joined),
        () = stop => {}
    }

    info!(grace_ms = grace.as_millis() as u64, "shutdown requested; draining in-flight requests");
    let _ = stop_tx.send(());

    match tokio::time::timeout(grace, &mut server).await {
        Ok(joined) => server_outcome(joined),
        Err(_) => {
            warn!(
                grace_ms = grace.as_millis() as u64,
                "in-flight requests did not finish in time; forcing shutdown"
            );
            server.abort();
            Ok(ServeOutcome::Forced)
        }
    }
}

fn server_outcome(
    joined: Result<std::io::Result<()>, JoinError>,
) -> Result<ServeOutcome, InfraError> {
    match joined {
        Ok(Ok(())) => {
            info!("server stopped");
            Ok(ServeOutcome::Drained)
        }
        Ok(Err(err)) => Err(InfraError::from(err)),
        Err(err) => Err(InfraError::server(format!("server task failed: {err}"))),
    }
}
