//! Mock distribution hub for integration tests.
//!
//! Accepts WebSocket connections like the production fan-out endpoint and
//! hands each accepted socket to the test as a [`HubConn`], so the test can
//! read client frames, push frames back, and tear the transport down on
//! demand.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

const WAIT: Duration = Duration::from_secs(5);

pub struct MockHub {
    addr: SocketAddr,
    accepted: mpsc::UnboundedReceiver<HubConn>,
}

impl MockHub {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (accepted_tx, accepted) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (inbound_tx, inbound) = mpsc::unbounded_channel();
                let (ops_tx, ops) = mpsc::unbounded_channel();
                tokio::spawn(drive(stream, inbound_tx, ops));
                if accepted_tx.send(HubConn { inbound, ops: ops_tx }).is_err() {
                    break;
                }
            }
        });

        Ok(Self { addr, accepted })
    }

    pub fn url(&self) -> String {
        format!("ws://{}/feed", self.addr)
    }

    /// Next client the hub accepted.
    pub async fn accept(&mut self) -> HubConn {
        timeout(WAIT, self.accepted.recv())
            .await
            .expect("timed out waiting for a client connection")
            .expect("hub accept loop ended")
    }

    /// Assert that no new client arrives within `window`.
    pub async fn assert_no_connection(&mut self, window: Duration) {
        if timeout(window, self.accepted.recv()).await.is_ok() {
            panic!("unexpected reconnection");
        }
    }
}

enum HubOp {
    Send(String),
    Drop,
}

pub struct HubConn {
    inbound: mpsc::UnboundedReceiver<String>,
    ops: mpsc::UnboundedSender<HubOp>,
}

impl HubConn {
    /// Push a raw text frame to the client.
    pub fn send(&self, frame: impl Into<String>) {
        let _ = self.ops.send(HubOp::Send(frame.into()));
    }

    /// Next text frame received from the client.
    pub async fn recv(&mut self) -> String {
        timeout(WAIT, self.inbound.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("client connection ended")
    }

    /// True once the client side has gone away.
    pub async fn closed(&mut self) -> bool {
        timeout(WAIT, async {
            while self.inbound.recv().await.is_some() {}
        })
        .await
        .is_ok()
    }

    /// Tear the transport down from the hub side.
    pub fn disconnect(&self) {
        let _ = self.ops.send(HubOp::Drop);
    }
}

async fn drive(
    stream: TcpStream,
    inbound: mpsc::UnboundedSender<String>,
    mut ops: mpsc::UnboundedReceiver<HubOp>,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(_) => return,
    };
    let (mut sink, mut source) = ws.split();

    loop {
        tokio::select! {
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if inbound.send(text).is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Close(_))) | None => return,
                Some(Err(_)) => return,
                Some(Ok(_)) => {}
            },
            op = ops.recv() => match op {
                Some(HubOp::Send(text)) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                Some(HubOp::Drop) | None => {
                    let _ = sink.close().await;
                    return;
                }
            },
        }
    }
}
