use anyhow::{Context, Result};
use tokio::io::{self, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::rpc::methods::{handle_raw_request, RpcServerState};

/// Serve JSON-RPC 2.0 over the process's stdin and stdout until stdin closes.
pub async fn serve_stdio(state: RpcServerState) -> Result<()> {
    serve_lines(io::stdin(), io::stdout(), state).await
}

/// Serve a single bidirectional stream.
pub async fn serve_connection<IO>(stream: IO, state: RpcServerState) -> Result<()>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, write_half) = io::split(stream);
    serve_lines(read_half, write_half, state).await
}

/// Newline-delimited framing: each request line yields one response line.
pub async fn serve_lines<R, W>(reader: R, mut writer: W, state: RpcServerState) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);

    loop {
        let mut request_line = Vec::new();
        let bytes_read = reader
            .read_until(b'\n', &mut request_line)
            .await
            .context("failed to read json-rpc request")?;

        if bytes_read == 0 {
            debug!("json-rpc input closed");
            return Ok(());
        }

        trim_line_endings(&mut request_line);
        if request_line.iter().all(|byte| byte.is_ascii_whitespace()) {
            continue;
        }

        let response = handle_raw_request(&request_line, &state).await;
        let mut encoded =
            serde_json::to_vec(&response).context("failed to serialize json-rpc response")?;
        encoded.push(b'\n');

        writer.write_all(&encoded).await.context("failed to write json-rpc response")?;
        writer.flush().await.context("failed to flush json-rpc response")?;
    }
}

fn trim_line_endings(line: &mut Vec<u8>) {
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
}
