use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pnet::{
    packet::{Packet, ip::IpNextHeaderProtocols},
    transport::{
        self, TransportChannelType, TransportProtocol, TransportReceiver, TransportSender,
    },
};
use tokio::sync::mpsc;

const TRANSPORT_BUFFER_SIZE: usize = 4096;
/// How often the listener thread checks whether anybody is still listening.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

// Sending goes through the kernel's IPv4 stack so the TTL socket option applies;
// receiving needs the IP header to learn the responder's TTL.
const CHANNEL_TYPE_ICMP_TX: TransportChannelType =
    TransportChannelType::Layer4(TransportProtocol::Ipv4(IpNextHeaderProtocols::Icmp));
const CHANNEL_TYPE_ICMP_RX: TransportChannelType =
    TransportChannelType::Layer3(IpNextHeaderProtocols::Icmp);

/// Raw ICMP socket pair. Captured datagrams arrive on `rx` stamped with their
/// arrival time, so queueing delay does not inflate round trip times.
pub struct TransportHandle {
    pub tx: Arc<Mutex<TransportSender>>,
    pub rx: mpsc::UnboundedReceiver<(Vec<u8>, Instant)>,
}

pub fn start_icmp_capture() -> std::io::Result<TransportHandle> {
    let (tx, _) = transport::transport_channel(TRANSPORT_BUFFER_SIZE, CHANNEL_TYPE_ICMP_TX)?;
    let (_, mut rx_socket) = transport::transport_channel(TRANSPORT_BUFFER_SIZE, CHANNEL_TYPE_ICMP_RX)?;
    let (queue_tx, queue_rx) = mpsc::unbounded_channel();

    std::thread::Builder::new()
        .name("latr-icmp-listener".into())
        .spawn(move || listen(&mut rx_socket, queue_tx))?;

    Ok(TransportHandle {
        tx: Arc::new(Mutex::new(tx)),
        rx: queue_rx,
    })
}

fn listen(rx_socket: &mut TransportReceiver, queue_tx: mpsc::UnboundedSender<(Vec<u8>, Instant)>) {
    let mut iterator = transport::ipv4_packet_iter(rx_socket);
    while !queue_tx.is_closed() {
        match iterator.next_with_timeout(POLL_INTERVAL) {
            Ok(Some((packet, _source))) => {
                if queue_tx.send((packet.packet().to_vec(), Instant::now())).is_err() {
                    break;
                }
            }
            Ok(None) => continue,
            Err(e) => {
                tracing::error!("ICMP listener stopped: {e}");
                break;
            }
        }
    }
}

/// Attempts to open a raw ICMP socket and closes it again right away.
pub fn can_open_raw_icmp() -> bool {
    transport::transport_channel(TRANSPORT_BUFFER_SIZE, CHANNEL_TYPE_ICMP_RX).is_ok()
}
