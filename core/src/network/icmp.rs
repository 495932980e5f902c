//! Echo request/reply exchange over the raw ICMP transport.
//!
//! A single listener feeds every captured datagram to a dispatcher task, which
//! matches replies to pending requests by sequence number. Concurrent callers
//! (parallel round targets, an inspection next to a round) share one socket.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use latr_protocols::icmp::{self, IcmpReply, ReplyKind};
use parking_lot::Mutex;
use pnet::packet::icmp::echo_request::EchoRequestPacket;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::network::transport::{self, TransportHandle};

/// Answer to one echo request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoReply {
    pub kind: ReplyKind,
    pub responder: IpAddr,
    /// TTL of the reply as it arrived.
    pub ttl: u8,
    pub rtt: Duration,
}

/// Sends one echo request and waits for whatever answers it.
#[async_trait]
pub trait EchoTransport: Send + Sync {
    /// Returns `None` when nothing answered within `timeout` or the request could
    /// not be sent.
    async fn echo(&self, dst: Ipv4Addr, ttl: u8, timeout: Duration) -> Option<EchoReply>;
}

type Pending = Mutex<HashMap<u16, oneshot::Sender<(IcmpReply, Instant)>>>;

pub struct IcmpChannel {
    sender: Arc<Mutex<pnet::transport::TransportSender>>,
    identifier: u16,
    sequence: AtomicU16,
    pending: Arc<Pending>,
}

impl IcmpChannel {
    /// Opens the raw socket pair and starts dispatching replies.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open() -> std::io::Result<Self> {
        let TransportHandle { tx, rx } = transport::start_icmp_capture()?;
        let identifier: u16 = rand::random();
        let pending: Arc<Pending> = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(dispatch(rx, identifier, Arc::downgrade(&pending)));
        debug!("ICMP channel open with identifier {identifier:#06x}");

        Ok(Self {
            sender: tx,
            identifier,
            sequence: AtomicU16::new(0),
            pending,
        })
    }

    fn next_sequence(&self) -> u16 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }
}

/// Routes captured replies to their waiting request.
///
/// Ends once the channel is dropped, which in turn closes the queue and stops
/// the listener thread.
async fn dispatch(
    mut rx: mpsc::UnboundedReceiver<(Vec<u8>, Instant)>,
    identifier: u16,
    pending: Weak<Pending>,
) {
    while let Some((bytes, received_at)) = rx.recv().await {
        let Some(pending) = pending.upgrade() else {
            break;
        };
        let reply: IcmpReply = match icmp::parse_reply(&bytes) {
            Ok(reply) if reply.identifier == identifier => reply,
            Ok(_) => continue,
            Err(e) => {
                trace!("skipping datagram: {e}");
                continue;
            }
        };
        if let Some(waiter) = pending.lock().remove(&reply.sequence) {
            let _ = waiter.send((reply, received_at));
        }
    }
}

#[async_trait]
impl EchoTransport for IcmpChannel {
    async fn echo(&self, dst: Ipv4Addr, ttl: u8, timeout: Duration) -> Option<EchoReply> {
        let sequence: u16 = self.next_sequence();
        let request: Vec<u8> = match icmp::create_echo_request(self.identifier, sequence) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("building echo request failed: {e}");
                return None;
            }
        };

        let (waiter_tx, waiter_rx) = oneshot::channel();
        self.pending.lock().insert(sequence, waiter_tx);

        let sender = self.sender.clone();
        let sent = tokio::task::spawn_blocking(move || -> std::io::Result<Instant> {
            let packet = EchoRequestPacket::new(&request)
                .ok_or_else(|| std::io::Error::other("echo request buffer too short"))?;
            let mut sender = sender.lock();
            sender.set_ttl(ttl)?;
            let sent_at: Instant = Instant::now();
            sender.send_to(packet, IpAddr::V4(dst))?;
            Ok(sent_at)
        })
        .await;

        let sent_at: Instant = match sent {
            Ok(Ok(sent_at)) => sent_at,
            Ok(Err(e)) => {
                debug!("sending echo to {dst} failed: {e}");
                self.pending.lock().remove(&sequence);
                return None;
            }
            Err(e) => {
                debug!("echo sender task failed: {e}");
                self.pending.lock().remove(&sequence);
                return None;
            }
        };

        match tokio::time::timeout(timeout, waiter_rx).await {
            Ok(Ok((reply, received_at))) => Some(EchoReply {
                kind: reply.kind,
                responder: IpAddr::V4(reply.source),
                ttl: reply.ttl,
                rtt: received_at.saturating_duration_since(sent_at),
            }),
            _ => {
                self.pending.lock().remove(&sequence);
                None
            }
        }
    }
}
