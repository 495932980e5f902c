//! ICMPv4 echo codec.
//!
//! Builds echo requests and classifies inbound IPv4 datagrams captured on a raw
//! ICMP socket. Error messages (time exceeded, destination unreachable) quote the
//! offending datagram, which is how a router's answer is matched back to the
//! request that triggered it.

use std::net::Ipv4Addr;

use anyhow::{Context, bail, ensure};
use pnet::packet::Packet;
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::{EchoRequestPacket, MutableEchoRequestPacket};
use pnet::packet::icmp::{self, IcmpCode, IcmpPacket, IcmpTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;

pub const ICMP_HDR_LEN: usize = 8;
pub const ECHO_PAYLOAD_LEN: usize = 32;
/// Unused (or next-hop MTU) word between the ICMP error header and the quote.
const ERROR_PREAMBLE_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// The destination itself answered.
    EchoReply,
    /// A router dropped the request because its TTL ran out.
    TimeExceeded,
    /// A router or the destination refused to deliver the request.
    DestinationUnreachable,
}

/// An ICMP message that answers one of our echo requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpReply {
    pub kind: ReplyKind,
    /// Sender of the ICMP message.
    pub source: Ipv4Addr,
    /// TTL of the reply datagram on arrival.
    pub ttl: u8,
    /// Identifier of the echo request being answered.
    pub identifier: u16,
    /// Sequence number of the echo request being answered.
    pub sequence: u16,
}

pub fn create_echo_request(identifier: u16, sequence: u16) -> anyhow::Result<Vec<u8>> {
    let mut buffer: Vec<u8> = vec![0u8; ICMP_HDR_LEN + ECHO_PAYLOAD_LEN];

    {
        let mut echo = MutableEchoRequestPacket::new(&mut buffer).context("creating echo request")?;
        echo.set_icmp_type(IcmpTypes::EchoRequest);
        echo.set_icmp_code(IcmpCode(0));
        echo.set_identifier(identifier);
        echo.set_sequence_number(sequence);
        let payload: Vec<u8> = (0..ECHO_PAYLOAD_LEN).map(|i| (i as u8) | 0x40).collect();
        echo.set_payload(&payload);
        echo.set_checksum(0);
    }

    let checksum = icmp::checksum(&IcmpPacket::new(&buffer).context("creating icmp packet")?);
    MutableEchoRequestPacket::new(&mut buffer)
        .context("creating echo request")?
        .set_checksum(checksum);

    Ok(buffer)
}

/// Classifies a full IPv4 datagram (header included) received on a raw socket.
///
/// Anything that is not an answer to an echo request is an error, including our
/// own requests looping back on the loopback interface.
pub fn parse_reply(datagram: &[u8]) -> anyhow::Result<IcmpReply> {
    let ip = Ipv4Packet::new(datagram).context("truncated IPv4 header")?;
    ensure!(
        ip.get_next_level_protocol() == IpNextHeaderProtocols::Icmp,
        "not an ICMP datagram"
    );

    let header_len = ip.get_header_length() as usize * 4;
    let icmp_bytes = datagram.get(header_len..).context("truncated IPv4 payload")?;
    let icmp = IcmpPacket::new(icmp_bytes).context("truncated ICMP header")?;

    let (kind, identifier, sequence) = match icmp.get_icmp_type() {
        IcmpTypes::EchoReply => {
            let echo = EchoReplyPacket::new(icmp_bytes).context("truncated echo reply")?;
            (ReplyKind::EchoReply, echo.get_identifier(), echo.get_sequence_number())
        }
        IcmpTypes::TimeExceeded => {
            let (identifier, sequence) = quoted_echo(icmp.payload())?;
            (ReplyKind::TimeExceeded, identifier, sequence)
        }
        IcmpTypes::DestinationUnreachable => {
            let (identifier, sequence) = quoted_echo(icmp.payload())?;
            (ReplyKind::DestinationUnreachable, identifier, sequence)
        }
        other => bail!("ignoring ICMP type {}", other.0),
    };

    Ok(IcmpReply {
        kind,
        source: ip.get_source(),
        ttl: ip.get_ttl(),
        identifier,
        sequence,
    })
}

/// Extracts identifier and sequence of the echo request quoted by an ICMP error.
fn quoted_echo(error_payload: &[u8]) -> anyhow::Result<(u16, u16)> {
    let quote = error_payload
        .get(ERROR_PREAMBLE_LEN..)
        .context("ICMP error without quoted datagram")?;
    let inner = Ipv4Packet::new(quote).context("truncated quoted IPv4 header")?;
    ensure!(
        inner.get_next_level_protocol() == IpNextHeaderProtocols::Icmp,
        "quoted datagram is not ICMP"
    );

    // Routers only have to quote 8 bytes past the header, so the quoted total
    // length cannot be trusted for slicing.
    let inner_len = inner.get_header_length() as usize * 4;
    let echo_bytes = quote.get(inner_len..).context("truncated quoted datagram")?;
    let echo = EchoRequestPacket::new(echo_bytes).context("truncated quoted echo request")?;
    ensure!(
        echo.get_icmp_type() == IcmpTypes::EchoRequest,
        "quoted ICMP message is not an echo request"
    );

    Ok((echo.get_identifier(), echo.get_sequence_number()))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::packet::icmp::IcmpType;
    use pnet::packet::ipv4::{self, MutableIpv4Packet};

    const IPV4_HDR_LEN: usize = 20;

    fn ipv4_datagram(source: Ipv4Addr, destination: Ipv4Addr, ttl: u8, payload: &[u8]) -> Vec<u8> {
        let mut buffer = vec![0u8; IPV4_HDR_LEN + payload.len()];
        {
            let mut ip = MutableIpv4Packet::new(&mut buffer).unwrap();
            ip.set_version(4);
            ip.set_header_length(5);
            ip.set_total_length((IPV4_HDR_LEN + payload.len()) as u16);
            ip.set_ttl(ttl);
            ip.set_next_level_protocol(IpNextHeaderProtocols::Icmp);
            ip.set_source(source);
            ip.set_destination(destination);
            ip.set_payload(payload);
            let checksum = ipv4::checksum(&ip.to_immutable());
            ip.set_checksum(checksum);
        }
        buffer
    }

    fn icmp_error(icmp_type: IcmpType, quoted: &[u8]) -> Vec<u8> {
        let mut message = vec![icmp_type.0, 0, 0, 0, 0, 0, 0, 0];
        message.extend_from_slice(quoted);
        message
    }

    #[test]
    fn echo_request_has_type_code_and_valid_checksum() {
        let packet = create_echo_request(0xbeef, 7).unwrap();
        assert_eq!(packet.len(), ICMP_HDR_LEN + ECHO_PAYLOAD_LEN);
        assert_eq!(packet[0], 8);
        assert_eq!(packet[1], 0);

        let parsed = IcmpPacket::new(&packet).unwrap();
        assert_eq!(parsed.get_checksum(), icmp::checksum(&parsed));

        let echo = EchoRequestPacket::new(&packet).unwrap();
        assert_eq!(echo.get_identifier(), 0xbeef);
        assert_eq!(echo.get_sequence_number(), 7);
    }

    #[test]
    fn parses_echo_reply_from_destination() {
        let mut reply = create_echo_request(42, 3).unwrap();
        reply[0] = IcmpTypes::EchoReply.0;
        let datagram = ipv4_datagram(Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(10, 0, 0, 2), 117, &reply);

        let parsed = parse_reply(&datagram).unwrap();
        assert_eq!(parsed.kind, ReplyKind::EchoReply);
        assert_eq!(parsed.source, Ipv4Addr::new(8, 8, 8, 8));
        assert_eq!(parsed.ttl, 117);
        assert_eq!((parsed.identifier, parsed.sequence), (42, 3));
    }

    #[test]
    fn parses_time_exceeded_quoting_truncated_request() {
        let request = create_echo_request(42, 9).unwrap();
        let original = ipv4_datagram(Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(8, 8, 8, 8), 1, &request);
        // Only the IP header plus 8 bytes are quoted.
        let quoted = &original[..IPV4_HDR_LEN + ICMP_HDR_LEN];
        let message = icmp_error(IcmpTypes::TimeExceeded, quoted);
        let datagram = ipv4_datagram(Ipv4Addr::new(192, 168, 0, 1), Ipv4Addr::new(10, 0, 0, 2), 64, &message);

        let parsed = parse_reply(&datagram).unwrap();
        assert_eq!(parsed.kind, ReplyKind::TimeExceeded);
        assert_eq!(parsed.source, Ipv4Addr::new(192, 168, 0, 1));
        assert_eq!((parsed.identifier, parsed.sequence), (42, 9));
    }

    #[test]
    fn parses_destination_unreachable() {
        let request = create_echo_request(5, 1).unwrap();
        let original = ipv4_datagram(Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 9, 9, 9), 64, &request);
        let message = icmp_error(IcmpTypes::DestinationUnreachable, &original);
        let datagram = ipv4_datagram(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2), 63, &message);

        let parsed = parse_reply(&datagram).unwrap();
        assert_eq!(parsed.kind, ReplyKind::DestinationUnreachable);
        assert_eq!((parsed.identifier, parsed.sequence), (5, 1));
    }

    #[test]
    fn rejects_our_own_echo_request() {
        let request = create_echo_request(1, 1).unwrap();
        let datagram = ipv4_datagram(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST, 64, &request);
        assert!(parse_reply(&datagram).is_err());
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(parse_reply(&[0x45, 0, 0]).is_err());

        let message = icmp_error(IcmpTypes::TimeExceeded, &[0x45, 0, 0, 28]);
        let datagram = ipv4_datagram(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2), 64, &message);
        assert!(parse_reply(&datagram).is_err());
    }
}
