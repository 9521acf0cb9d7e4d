//! Unix socket server

use crate::gateway::Gateway;
use codebench_core::protocol::{self, Request, Response};
use std::future::Future;
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};

/// Accept connections until `shutdown` resolves
pub async fn run<F>(listener: UnixListener, gateway: Gateway, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    let gateway = Arc::new(gateway);
    tokio::pin!(shutdown);

    loop {
        let stream = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(e) => {
                    // EMFILE and friends: back off instead of spinning
                    tracing::warn!(error = %e, "accept failed");
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    continue;
                }
            },
            () = &mut shutdown => {
                tracing::info!("shutdown requested, no longer accepting connections");
                return Ok(());
            }
        };

        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, gateway).await {
                tracing::error!(error = %e, "connection error");
            }
        });
    }
}

/// Handle a single client connection
async fn handle_connection(
    mut stream: UnixStream,
    gateway: Arc<Gateway>,
) -> codebench_core::Result<()> {
    loop {
        let request: Request = match protocol::read_frame(&mut stream).await {
            Ok(Some(request)) => request,
            Ok(None) => break, // Client disconnected
            Err(e) => {
                // Tell the client what went wrong before dropping it.
                let _ = protocol::write_frame(&mut stream, &Response::from(&e)).await;
                return Err(e);
            }
        };
        tracing::debug!(?request, "received request");

        let response = gateway.handle(request).await;
        protocol::write_frame(&mut stream, &response).await?;
    }

    Ok(())
}
