// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Line-oriented health probe listener (`ruok`, `stat`, ...).
//!
//! The socket is bound synchronously so bind failures surface as startup errors; connections
//! are then served by a single-threaded tokio runtime on a dedicated thread. Each connection
//! gets one reply to its first line and is closed.

use crate::error::EngineError;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

pub(super) type Responder = Arc<dyn Fn(&str) -> String + Send + Sync>;

pub(super) struct ProbeListener {
    shutdown: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl ProbeListener {
    pub(super) fn bind(
        name: &'static str,
        host: &str,
        port: u16,
        responder: Responder,
    ) -> Result<Self, EngineError> {
        let ip: IpAddr = host.parse().map_err(|_| EngineError::InvalidConfig {
            key: "host".to_owned(),
            value: host.to_owned(),
            reason: "expected an IP address literal".to_owned(),
        })?;
        let address = SocketAddr::new(ip, port);
        let io_error =
            |context: String| move |source: std::io::Error| EngineError::Io { context, source };

        let listener = std::net::TcpListener::bind(address)
            .map_err(io_error(format!("failed to bind the {name} listener on {address}")))?;
        listener
            .set_nonblocking(true)
            .map_err(io_error(format!("failed to configure the {name} listener")))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()
            .map_err(io_error(format!("failed to build the {name} listener runtime")))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = thread::Builder::new()
            .name(format!("{name}-listener"))
            .spawn(move || runtime.block_on(serve(name, listener, responder, shutdown_rx)))
            .map_err(io_error(format!("failed to spawn the {name} listener thread")))?;
        tracing::debug!(%address, name, "probe listener bound");

        Ok(Self {
            shutdown: Some(shutdown_tx),
            worker: Some(worker),
        })
    }

    /// Stops accepting and waits for the listener thread, releasing the port.
    pub(super) fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            _ = shutdown.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("probe listener thread panicked");
            }
        }
    }
}

impl Drop for ProbeListener {
    fn drop(&mut self) {
        self.close();
    }
}

async fn serve(
    name: &'static str,
    listener: std::net::TcpListener,
    responder: Responder,
    mut shutdown: oneshot::Receiver<()>,
) {
    let listener = match TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(name, %error, "probe listener could not be registered");
            return;
        }
    };
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    _ = tokio::spawn(answer(stream, Arc::clone(&responder)));
                }
                Err(error) => tracing::debug!(name, %error, "probe accept failed"),
            },
        }
    }
}

async fn answer(stream: TcpStream, responder: Responder) {
    let (reader, mut writer) = stream.into_split();
    let mut line = String::new();
    if BufReader::new(reader).read_line(&mut line).await.is_err() {
        return;
    }
    let reply = responder(line.trim());
    if writer.write_all(reply.as_bytes()).await.is_ok() {
        _ = writer.shutdown().await;
    }
}
