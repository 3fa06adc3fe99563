//! HTTP listener
//!
//! Serves the router over plain TCP, or over TLS (rustls) when the config
//! names a certificate and key.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::TlsConfig;

/// Time in-flight TLS connections get to finish once shutdown starts.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("unable to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("loading TLS certificate/key: {0}")]
    Tls(#[source] io::Error),

    #[error("HTTP server failed: {0}")]
    Io(#[from] io::Error),
}

/// Serves `app` on `address` until `shutdown` resolves.
pub async fn serve<F>(
    app: Router,
    address: &str,
    tls: &TlsConfig,
    shutdown: F,
) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let Some((cert, key)) = tls.pem_files() else {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| bind_error(address, source))?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        return Ok(());
    };

    let rustls = RustlsConfig::from_pem_file(cert, key)
        .await
        .map_err(ServeError::Tls)?;
    let addr = resolve(address).await?;

    let handle = Handle::new();
    let trigger = handle.clone();
    tokio::spawn(async move {
        shutdown.await;
        trigger.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
    });

    axum_server::bind_rustls(addr, rustls)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

async fn resolve(address: &str) -> Result<SocketAddr, ServeError> {
    tokio::net::lookup_host(address)
        .await
        .map_err(|source| bind_error(address, source))?
        .next()
        .ok_or_else(|| {
            bind_error(
                address,
                io::Error::new(io::ErrorKind::AddrNotAvailable, "no address resolved"),
            )
        })
}

fn bind_error(address: &str, source: io::Error) -> ServeError {
    ServeError::Bind {
        address: address.to_string(),
        source,
    }
}
