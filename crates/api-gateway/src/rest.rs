//! HTTP server

use std::future::Future;
use std::io;
use std::net::{SocketAddr, TcpListener};

use axum::Router;
use tracing::info;

use common::error::{Error, Result};

/// The REST API bound to a listening socket
pub struct RestApi {
    listener: TcpListener,
    router: Router,
}

impl RestApi {
    /// Resolves `host:port` and binds the listener
    pub async fn bind(host: &str, port: u16, router: Router) -> Result<Self> {
        let addr = tokio::net::lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| Error::Config(format!("Cannot resolve bind address {}:{}", host, port)))?;

        let listener = TcpListener::bind(addr)?;

        Ok(Self { listener, router })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves requests until `shutdown` completes, then drains open connections
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Listening on http://{}", self.local_addr()?);

        axum::Server::from_tcp(self.listener)
            .map_err(server_error)?
            .serve(self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(server_error)?;

        info!("HTTP server stopped");
        Ok(())
    }
}

fn server_error(err: hyper::Error) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::Other, err))
}
