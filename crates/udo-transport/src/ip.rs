use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use udo_frame::datagram::DatagramHeader;
use udo_frame::{
    decode_response_datagram, encode_request_datagram, Request, Response, Status, DEFAULT_PORT,
};

use crate::error::{Result, UdoError};
use crate::retry::{with_retries, DEFAULT_MAX_TRIES};
use crate::traits::{Protocol, Transport};

/// Default wait for one reply datagram.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

const RECV_BUFFER_SIZE: usize = 1536;

/// Configuration for the UDP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpConfig {
    pub host: String,
    pub port: u16,
    /// Maximum wait for each reply datagram.
    pub timeout: Duration,
    /// Full request/response attempts per operation.
    pub max_tries: u32,
}

impl Default for IpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            max_tries: DEFAULT_MAX_TRIES,
        }
    }
}

impl IpConfig {
    /// Parse a `host[:port]` string.
    pub fn from_target(target: &str) -> Result<Self> {
        let (host, port) = match target.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse().map_err(|_| {
                    UdoError::connection("Open", format!("invalid port '{port}'"))
                })?;
                (host, port)
            }
            None => (target, DEFAULT_PORT),
        };
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(UdoError::connection("Open", "empty host name"));
        }
        Ok(Self {
            host: host.to_string(),
            port,
            ..Self::default()
        })
    }
}

/// UDO over UDP: one datagram per request, one per reply.
///
/// Replies are matched to the outstanding request by correlation id, index
/// and offset; anything else is treated as stale and the request is resent.
pub struct IpTransport {
    config: IpConfig,
    socket: Option<UdpSocket>,
    peer: Option<SocketAddr>,
    seq: u32,
    tx: BytesMut,
    rx: Vec<u8>,
}

impl IpTransport {
    pub fn new(config: IpConfig) -> Self {
        Self {
            config,
            socket: None,
            peer: None,
            seq: 0,
            tx: BytesMut::with_capacity(RECV_BUFFER_SIZE),
            rx: vec![0u8; RECV_BUFFER_SIZE],
        }
    }

    pub fn config(&self) -> &IpConfig {
        &self.config
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.config.timeout = timeout;
        if let Some(socket) = &self.socket {
            socket
                .set_read_timeout(Some(timeout))
                .map_err(|err| UdoError::io("SetTimeout", err))?;
        }
        Ok(())
    }

    pub fn set_max_tries(&mut self, max_tries: u32) {
        self.config.max_tries = max_tries;
    }

    /// Correlation id of the most recent request.
    pub fn last_id(&self) -> u32 {
        self.seq
    }

    fn transact(&mut self, req: &Request) -> Result<Response> {
        let op = req.describe();
        let (socket, peer) = match (&self.socket, self.peer) {
            (Some(socket), Some(peer)) => (socket, peer),
            _ => return Err(UdoError::connection(&op, "not connected")),
        };

        self.seq = self.seq.wrapping_add(1);
        let id = self.seq;
        self.tx.clear();
        encode_request_datagram(id, req, &mut self.tx)
            .map_err(|err| UdoError::from_frame(&op, err))?;

        let tx = &self.tx[..];
        let rx = &mut self.rx;
        let resp = with_retries(self.config.max_tries, |_| {
            socket
                .send_to(tx, peer)
                .map_err(|err| UdoError::io(&op, err))?;
            let len = match socket.recv_from(rx) {
                Ok((len, _)) => len,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(UdoError::Timeout { op: op.clone() });
                }
                Err(err) => return Err(UdoError::io(&op, err)),
            };
            accept_reply(id, req, &rx[..len], &op)
        })?;

        match resp.status {
            Status::Error(code) => Err(UdoError::Device { op, code }),
            Status::Ok => Ok(resp),
        }
    }
}

fn accept_reply(id: u32, req: &Request, datagram: &[u8], op: &str) -> Result<Response> {
    let header = DatagramHeader::decode(datagram).map_err(|err| UdoError::from_frame(op, err))?;
    if header.id != id || header.index != req.index || header.offset != req.offset {
        tracing::debug!(
            op,
            expected_id = id,
            got_id = header.id,
            got_index = header.index,
            got_offset = header.offset,
            "ignoring foreign reply"
        );
        return Err(UdoError::UnexpectedResponse { op: op.to_string() });
    }
    let (_, resp) =
        decode_response_datagram(datagram).map_err(|err| UdoError::from_frame(op, err))?;
    Ok(resp)
}

impl Transport for IpTransport {
    fn open(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Ok(());
        }
        let op = format!("Open({}:{})", self.config.host, self.config.port);
        let peer = (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(|err| UdoError::io(&op, err))?
            .next()
            .ok_or_else(|| UdoError::connection(&op, "host did not resolve"))?;

        let local: SocketAddr = if peer.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).map_err(|err| UdoError::io(&op, err))?;
        socket
            .set_read_timeout(Some(self.config.timeout))
            .map_err(|err| UdoError::io(&op, err))?;

        tracing::info!(%peer, "udp link opened");
        self.socket = Some(socket);
        self.peer = Some(peer);
        self.seq = 0;
        Ok(())
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            tracing::info!(host = %self.config.host, port = self.config.port, "udp link closed");
        }
        self.peer = None;
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn read(&mut self, index: u16, offset: u32, max_len: usize) -> Result<Bytes> {
        let resp = self.transact(&Request::read(index, offset, max_len))?;
        if resp.payload.len() > max_len {
            return Err(UdoError::DataTooBig {
                op: format!("UdoRead({index:04X}, {offset})"),
                len: resp.payload.len(),
                max: max_len,
            });
        }
        Ok(resp.payload)
    }

    fn write(&mut self, index: u16, offset: u32, data: &[u8]) -> Result<()> {
        self.transact(&Request::write(index, offset, data.to_vec()))?;
        Ok(())
    }

    fn protocol(&self) -> Protocol {
        Protocol::Ip
    }
}

impl std::fmt::Debug for IpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpTransport")
            .field("config", &self.config)
            .field("peer", &self.peer)
            .field("seq", &self.seq)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread::{self, JoinHandle};

    use bytes::BufMut;
    use udo_frame::encode_response_datagram;

    use super::*;
    use crate::codes;

    /// Serve requests on a loopback socket until it has been idle for a
    /// while; returns every request header seen. `handler` gets the 1-based
    /// request number and returns the reply datagram, if any.
    fn spawn_device<F>(mut handler: F) -> (SocketAddr, JoinHandle<Vec<DatagramHeader>>)
    where
        F: FnMut(usize, &DatagramHeader, &[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(400)))
            .unwrap();
        let addr = socket.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            let mut buf = [0u8; 2048];
            while let Ok((len, from)) = socket.recv_from(&mut buf) {
                let header = DatagramHeader::decode(&buf[..len]).unwrap();
                seen.push(header);
                if let Some(reply) = handler(seen.len(), &header, &buf[16..len]) {
                    socket.send_to(&reply, from).unwrap();
                }
            }
            seen
        });
        (addr, handle)
    }

    fn reply(header: &DatagramHeader, resp: &Response) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_response_datagram(header.id, header.is_write(), resp, &mut buf).unwrap();
        buf.to_vec()
    }

    fn transport(addr: SocketAddr, timeout_ms: u64) -> IpTransport {
        let mut t = IpTransport::new(IpConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            timeout: Duration::from_millis(timeout_ms),
            ..IpConfig::default()
        });
        t.open().unwrap();
        t
    }

    #[test]
    fn read_and_write_roundtrip() {
        let (addr, device) = spawn_device(|_, head, body| {
            let resp = if head.is_write() {
                assert_eq!(body, &[0x0F, 0xF0, 0x0F, 0x0F]);
                Response::ok(head.index, head.offset, Vec::new())
            } else {
                Response::ok(head.index, head.offset, 0x66CC_AA55u32.to_le_bytes().to_vec())
            };
            Some(reply(head, &resp))
        });

        let mut t = transport(addr, 200);
        assert!(t.is_open());
        assert_eq!(t.protocol(), Protocol::Ip);

        let data = t.read(0x0000, 0, 4).unwrap();
        assert_eq!(data.as_ref(), &0x66CC_AA55u32.to_le_bytes());
        t.write(0x1500, 0, &[0x0F, 0xF0, 0x0F, 0x0F]).unwrap();
        t.close();

        let seen = device.join().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].len_cmd, 4);
        assert_eq!(seen[1].len_cmd, 0x8000 | 4);
    }

    #[test]
    fn correlation_ids_strictly_increase() {
        let (addr, device) = spawn_device(|_, head, _| {
            Some(reply(head, &Response::ok(head.index, head.offset, vec![1])))
        });

        let mut t = transport(addr, 200);
        for _ in 0..4 {
            t.read(0x0010, 0, 1).unwrap();
        }
        assert_eq!(t.last_id(), 4);
        t.close();

        let ids: Vec<u32> = device.join().unwrap().iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn succeeds_after_two_lost_replies() {
        let (addr, device) = spawn_device(|n, head, _| {
            (n > 2).then(|| reply(head, &Response::ok(head.index, head.offset, vec![7, 7])))
        });

        let mut t = transport(addr, 50);
        let data = t.read(0x0020, 0, 2).unwrap();
        assert_eq!(data.as_ref(), &[7, 7]);
        t.close();

        let seen = device.join().unwrap();
        assert_eq!(seen.len(), 3);
        // retries reuse the correlation id
        assert!(seen.iter().all(|h| h.id == 1));
    }

    #[test]
    fn silent_device_times_out_after_max_tries() {
        let (addr, device) = spawn_device(|_, _, _| None);

        let mut t = transport(addr, 50);
        let err = t.read(0x0020, 0, 2).unwrap_err();
        assert!(matches!(err, UdoError::Timeout { .. }));
        assert_eq!(err.code(), codes::TIMEOUT);
        assert_eq!(err.op(), "UdoRead(0020, 0)");
        t.close();

        assert_eq!(device.join().unwrap().len(), DEFAULT_MAX_TRIES as usize);
    }

    #[test]
    fn stale_reply_is_rejected_and_retried() {
        let (addr, device) = spawn_device(|n, head, _| {
            let mut stale = *head;
            if n == 1 {
                stale.id = head.id.wrapping_sub(1);
            }
            Some(reply(&stale, &Response::ok(head.index, head.offset, vec![5])))
        });

        let mut t = transport(addr, 200);
        assert_eq!(t.read(0x0030, 4, 1).unwrap().as_ref(), &[5]);
        t.close();
        assert_eq!(device.join().unwrap().len(), 2);
    }

    #[test]
    fn mismatched_offset_exhausts_retries() {
        let (addr, device) = spawn_device(|_, head, _| {
            Some(reply(head, &Response::ok(head.index, head.offset + 1, vec![5])))
        });

        let mut t = transport(addr, 200);
        let err = t.read(0x0030, 4, 1).unwrap_err();
        assert!(matches!(err, UdoError::Connection { .. }));
        assert_eq!(err.code(), codes::CONNECTION);
        assert!(err.to_string().contains("retries exhausted: unexpected response"));
        t.close();
        assert_eq!(device.join().unwrap().len(), DEFAULT_MAX_TRIES as usize);
    }

    #[test]
    fn error_marker_is_a_device_fault() {
        let (addr, device) = spawn_device(|_, head, _| {
            let mut buf = BytesMut::new();
            let mut header = *head;
            header.len_cmd = 0x07FF;
            header.encode(&mut buf);
            buf.put_u16_le(codes::WRONG_INDEX);
            Some(buf.to_vec())
        });

        let mut t = transport(addr, 200);
        let err = t.read(0x6666, 0, 4).unwrap_err();
        assert!(matches!(err, UdoError::Device { code: codes::WRONG_INDEX, .. }));
        t.close();
        assert_eq!(device.join().unwrap().len(), 1);
    }

    #[test]
    fn error_marker_without_code_is_not_retried() {
        let (addr, device) = spawn_device(|_, head, _| {
            let mut buf = BytesMut::new();
            let mut header = *head;
            header.len_cmd = 0x07FF;
            header.encode(&mut buf);
            buf.put_u8(0x20);
            Some(buf.to_vec())
        });

        let mut t = transport(addr, 200);
        let err = t.read(0x6666, 0, 4).unwrap_err();
        assert!(matches!(err, UdoError::Connection { .. }));
        assert_eq!(err.code(), codes::CONNECTION);
        assert!(!err.is_transient());
        t.close();
        assert_eq!(device.join().unwrap().len(), 1);
    }

    #[test]
    fn oversized_reply_is_a_fault() {
        let (addr, device) = spawn_device(|_, head, _| {
            Some(reply(head, &Response::ok(head.index, head.offset, vec![0; 16])))
        });

        let mut t = transport(addr, 200);
        let err = t.read(0x0003, 0, 8).unwrap_err();
        assert!(matches!(err, UdoError::DataTooBig { len: 16, max: 8, .. }));
        t.close();
        assert_eq!(device.join().unwrap().len(), 1);
    }

    #[test]
    fn short_datagram_is_retried() {
        let (addr, device) = spawn_device(|n, head, _| {
            if n == 1 {
                Some(vec![0u8; 5])
            } else {
                Some(reply(head, &Response::ok(head.index, head.offset, vec![9])))
            }
        });

        let mut t = transport(addr, 200);
        assert_eq!(t.read(0x0001, 0, 1).unwrap().as_ref(), &[9]);
        t.close();
        assert_eq!(device.join().unwrap().len(), 2);
    }

    #[test]
    fn closed_transport_fails() {
        let mut t = IpTransport::new(IpConfig::default());
        assert!(!t.is_open());
        assert!(matches!(
            t.write(1, 0, &[1]),
            Err(UdoError::Connection { .. })
        ));
    }

    #[test]
    fn parses_ip_targets() {
        let cfg = IpConfig::from_target("192.168.1.50:4000").unwrap();
        assert_eq!(cfg.host, "192.168.1.50");
        assert_eq!(cfg.port, 4000);

        let cfg = IpConfig::from_target("device.local").unwrap();
        assert_eq!(cfg.port, DEFAULT_PORT);

        let cfg = IpConfig::from_target("[::1]:1300").unwrap();
        assert_eq!(cfg.host, "::1");
        assert_eq!(cfg.port, 1300);

        assert!(IpConfig::from_target("host:abc").is_err());
        assert!(IpConfig::from_target(":1221").is_err());
    }
}
