use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use protocol::api::{ApiRequest, ApiResponse};

/// Transport seam between the sync engine and the runner. Production is
/// length-delimited JSON over TCP; tests substitute a scripted channel.
#[async_trait]
pub(crate) trait ControlChannel {
    async fn send(&mut self, request: ApiRequest) -> anyhow::Result<()>;
    /// Next response frame; `None` once the peer has closed the channel.
    async fn next_response(&mut self) -> Option<anyhow::Result<ApiResponse>>;
}

pub(crate) struct RunnerChannel {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

pub(crate) async fn connect_runner(addr: &str) -> anyhow::Result<RunnerChannel> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect runner addr {addr}"))?;
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(protocol::framing::MAX_FRAME_LENGTH)
        .new_codec();
    Ok(RunnerChannel {
        framed: Framed::new(stream, codec),
    })
}

#[async_trait]
impl ControlChannel for RunnerChannel {
    async fn send(&mut self, request: ApiRequest) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(&request)?;
        self.framed.send(Bytes::from(payload)).await?;
        Ok(())
    }

    async fn next_response(&mut self) -> Option<anyhow::Result<ApiResponse>> {
        let frame = self.framed.next().await?;
        Some(
            frame
                .context("read control frame")
                .and_then(|bytes| serde_json::from_slice(&bytes).context("decode control frame")),
        )
    }
}
