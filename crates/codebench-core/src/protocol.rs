//! Wire protocol for daemon communication
//!
//! Every message is msgpack, framed by a 4-byte big-endian length prefix.

use crate::{CodebenchError, ExecutionRequest, ExecutionResult, FileNode, InstallRequest, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame either side will accept
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Request types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// List the whole workspace
    Tree,
    ReadFile { path: String },
    WriteFile { path: String, content: Vec<u8> },
    DeleteFile { path: String },
    MakeDirectory { path: String },
    /// Store files under the root with sanitized names
    Upload { files: Vec<(String, Vec<u8>)> },
    Install(InstallRequest),
    Execute(ExecutionRequest),
    Ping,
}

/// Response types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Tree { nodes: Vec<FileNode> },
    File { content: Vec<u8> },
    /// Stored names, in request order
    Uploaded { files: Vec<String> },
    /// Result of an execution or installation
    Execution(ExecutionResult),
    Ok,
    Pong,
    Error { kind: String, message: String },
}

impl From<&CodebenchError> for Response {
    fn from(err: &CodebenchError) -> Self {
        Self::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Encode a message to msgpack
pub fn encode<T: Serialize>(msg: &T) -> std::result::Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec_named(msg)
}

/// Decode a message from msgpack
pub fn decode<'a, T: Deserialize<'a>>(
    data: &'a [u8],
) -> std::result::Result<T, rmp_serde::decode::Error> {
    rmp_serde::from_slice(data)
}

/// Encode and write one length-prefixed frame
pub async fn write_frame<W, T>(stream: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = encode(msg).map_err(|e| CodebenchError::Protocol(format!("encode failed: {e}")))?;
    let len = u32::try_from(bytes.len())
        .ok()
        .filter(|len| *len as usize <= MAX_FRAME_LEN)
        .ok_or_else(|| {
            CodebenchError::Protocol(format!("frame too large: {} bytes", bytes.len()))
        })?;

    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(&bytes).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one frame; `Ok(None)` on a clean end of stream before the prefix
pub async fn read_frame<R, T>(stream: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: for<'de> Deserialize<'de>,
{
    let mut len_bytes = [0u8; 4];
    match stream.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(CodebenchError::Protocol(format!("frame too large: {len} bytes")));
    }

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    decode(&buf)
        .map(Some)
        .map_err(|e| CodebenchError::Protocol(format!("decode failed: {e}")))
}
