//! Serving with a bounded graceful shutdown.

use std::future::{Future, IntoFuture};

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::GracePeriod;

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}

/// Serve `app` until `signal` resolves, then give in-flight requests `grace`
/// to finish. Returns once every connection has closed or the grace period
/// has elapsed, whichever comes first.
pub async fn serve_with_grace(
    listener: TcpListener,
    app: Router,
    grace: GracePeriod,
    signal: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let (fired_tx, mut fired_rx) = watch::channel(false);

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            let _ = fired_tx.send(true);
        })
        .into_future();
    tokio::pin!(server);

    let grace_elapsed = async move {
        if fired_rx.wait_for(|fired| *fired).await.is_err() {
            std::future::pending::<()>().await;
        }
        match grace {
            GracePeriod::Bounded(period) => {
                info!(grace_ms = period.as_millis() as u64, "draining in-flight requests");
                tokio::time::sleep(period).await;
            }
            GracePeriod::Unbounded => {
                info!("draining in-flight requests without a deadline");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        result = &mut server => {
            result?;
            info!("server stopped");
        }
        _ = grace_elapsed => {
            warn!("grace period elapsed; dropping remaining connections");
        }
    }
    Ok(())
}
