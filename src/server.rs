//! MITM server: accepts a device connection, dials the real portal, and
//! shuttles bytes both ways while the handlers watch the stream.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use bytes::BytesMut;
use log::{debug, error, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::Error;
use crate::metrics::Prometheus;
use crate::sems::batsignal::SystemClock;
use crate::sems::frame::{FrameDecoder, FrameEvent};
use crate::sems::inbound::InboundHandler;
use crate::sems::outbound::OutboundHandler;
use crate::sems::packet::KEEPALIVE;
use crate::sems::PacketHandler;

/// The real portal endpoint the devices believe they are talking to.
pub const UPSTREAM_HOST: &str = "tcp.goodwe-power.com:20001";
/// Port the devices are redirected to locally.
pub const LISTEN_PORT: u16 = 20001;

const LISTEN_TIMEOUT: Duration = Duration::from_secs(2);
const READ_TIMEOUT: Duration = Duration::from_secs(1);
const CONN_TIMEOUT: Duration = Duration::from_secs(8);

pub struct Server {
    batsignal: bool,
}

impl Server {
    pub fn new(batsignal: bool) -> Self {
        Self { batsignal }
    }

    /// Accept loop. Runs until the token is cancelled or the listener
    /// fails; in-flight sessions are joined before returning.
    pub async fn serve(&self, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", LISTEN_PORT)).await?;
        info!("listening on port {LISTEN_PORT}, upstream {UPSTREAM_HOST}");
        let mut sessions: Vec<JoinHandle<()>> = Vec::new();
        while !shutdown.is_cancelled() {
            sessions.retain(|handle| !handle.is_finished());
            // bounded accept so cancellation is observed without traffic
            let accepted = match timeout(LISTEN_TIMEOUT, listener.accept()).await {
                Err(_) => continue,
                Ok(Ok(accepted)) => accepted,
                Ok(Err(err)) => {
                    error!("couldn't accept connection: {err}");
                    break;
                }
            };
            let (conn, client) = accepted;
            // connect upstream as per a regular device
            let upstream = match timeout(CONN_TIMEOUT, TcpStream::connect(UPSTREAM_HOST)).await {
                Ok(Ok(upstream)) => upstream,
                Ok(Err(err)) => {
                    error!("couldn't dial upstream {UPSTREAM_HOST}: {err}");
                    continue;
                }
                Err(_) => {
                    error!(
                        "couldn't dial upstream {UPSTREAM_HOST}: timeout after {}s",
                        CONN_TIMEOUT.as_secs()
                    );
                    continue;
                }
            };
            let conn_id = short_conn_id();
            debug!("{conn_id}: new connection from {client}");
            let session = Session {
                conn_id,
                batsignal: self.batsignal,
                token: shutdown.child_token(),
            };
            sessions.push(tokio::spawn(session.run(conn, upstream)));
        }
        futures::future::join_all(sessions).await;
        Ok(())
    }
}

fn short_conn_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// One intercepted device connection: a duplex pair of pumps sharing a
/// child cancellation token. Either pump finishing tears down both.
struct Session {
    conn_id: String,
    batsignal: bool,
    token: CancellationToken,
}

impl Session {
    async fn run(self, conn: TcpStream, upstream: TcpStream) {
        let (device_read, device_write) = conn.into_split();
        let (upstream_read, upstream_write) = upstream.into_split();

        let outbound_tag = format!("{}/outbound", self.conn_id);
        let inbound_tag = format!("{}/inbound", self.conn_id);
        let outbound_handler: Box<dyn PacketHandler> = Box::new(OutboundHandler::new(
            outbound_tag.clone(),
            self.batsignal,
            Arc::new(Prometheus),
            Arc::new(SystemClock),
        ));
        let inbound_handler: Box<dyn PacketHandler> = Box::new(InboundHandler::new(
            inbound_tag.clone(),
            Arc::new(Prometheus),
        ));

        let outbound = Pump {
            tag: outbound_tag,
            token: self.token.clone(),
            decoder: FrameDecoder::outbound(),
            handler: outbound_handler,
            forward_on_error: true,
        };
        let inbound = Pump {
            tag: inbound_tag,
            token: self.token.clone(),
            decoder: FrameDecoder::inbound(),
            handler: inbound_handler,
            forward_on_error: false,
        };

        let outbound_token = self.token.clone();
        let outbound_task = tokio::spawn(async move {
            let tag = outbound.tag.clone();
            if let Err(err) = outbound.run(device_read, upstream_write).await {
                error!("{tag}: couldn't handle connection: {err}");
            }
            debug!("{tag}: connection handler exiting");
            // tear down the other direction too
            outbound_token.cancel();
        });
        let inbound_token = self.token.clone();
        let inbound_task = tokio::spawn(async move {
            let tag = inbound.tag.clone();
            if let Err(err) = inbound.run(upstream_read, device_write).await {
                error!("{tag}: couldn't handle connection: {err}");
            }
            debug!("{tag}: connection handler exiting");
            inbound_token.cancel();
        });
        let _ = outbound_task.await;
        let _ = inbound_task.await;
        debug!("{}: session closed", self.conn_id);
    }
}

/// Intercepts traffic in one direction of a TCP connection.
struct Pump {
    tag: String,
    token: CancellationToken,
    decoder: FrameDecoder,
    handler: Box<dyn PacketHandler>,
    forward_on_error: bool,
}

impl Pump {
    async fn run(mut self, mut reader: OwnedReadHalf, mut writer: OwnedWriteHalf) -> Result<()> {
        let mut buf = BytesMut::with_capacity(8192);
        loop {
            let read = tokio::select! {
                _ = self.token.cancelled() => {
                    debug!("{}: cancelled", self.tag);
                    return Ok(());
                }
                read = timeout(READ_TIMEOUT, reader.read_buf(&mut buf)) => read,
            };
            match read {
                Err(_) => continue, // reached deadline, re-check cancellation
                Ok(Ok(0)) => {
                    debug!("{}: {}", self.tag, Error::Closed);
                    return Ok(());
                }
                Ok(Ok(_)) => {}
                Ok(Err(err)) if err.kind() == std::io::ErrorKind::ConnectionReset => {
                    debug!("{}: {}", self.tag, Error::Closed);
                    return Ok(());
                }
                Ok(Err(err)) => bail!("couldn't read: {err}"),
            }
            while let Some(event) = self.decoder.decode(&mut buf)? {
                match event {
                    FrameEvent::Keepalive => {
                        debug!("{}: keepalive(?)", self.tag);
                        self.forward(&mut writer, &KEEPALIVE).await?;
                    }
                    FrameEvent::ResyncSkipped(discarded) => {
                        warn!("{}: {}", self.tag, Error::UnknownPrefix(discarded));
                    }
                    FrameEvent::Frame(data) => {
                        match self.handler.handle_packet(&data) {
                            Ok(Some(rewritten)) => {
                                self.forward(&mut writer, &rewritten).await?;
                            }
                            Ok(None) => self.forward(&mut writer, &data).await?,
                            Err(err) => {
                                // not fatal, since maybe we just don't
                                // handle the packet correctly yet
                                warn!(
                                    "{}: couldn't handle packet {:02x?}: {err}",
                                    self.tag, &data[..],
                                );
                                if self.forward_on_error {
                                    self.forward(&mut writer, &data).await?;
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    async fn forward(&self, writer: &mut OwnedWriteHalf, data: &[u8]) -> Result<()> {
        writer
            .write_all(data)
            .await
            .map_err(Error::WriteFailed)?;
        Ok(())
    }
}
