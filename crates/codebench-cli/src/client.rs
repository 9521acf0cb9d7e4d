//! Daemon client

use codebench_core::protocol::{self, Request, Response};
use codebench_core::{CodebenchError, Result};
use std::path::Path;
use tokio::net::UnixStream;

/// One connection to the daemon; requests are answered in order
pub struct Client {
    stream: UnixStream,
}

impl Client {
    pub async fn connect(socket: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket).await?;
        tracing::debug!(socket = %socket.display(), "connected to daemon");
        Ok(Self { stream })
    }

    /// Send `request` and wait for its response
    ///
    /// `Response::Error` is turned back into an error carrying the kind.
    pub async fn call(&mut self, request: &Request) -> Result<Response> {
        protocol::write_frame(&mut self.stream, request).await?;
        match protocol::read_frame(&mut self.stream).await? {
            Some(Response::Error { kind, message }) => {
                Err(CodebenchError::Protocol(format!("{kind}: {message}")))
            }
            Some(response) => Ok(response),
            None => Err(CodebenchError::Protocol("daemon closed the connection".into())),
        }
    }
}
