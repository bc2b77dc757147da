#![cfg(feature = "cli")]

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::process::{Command, Output};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::BytesMut;
use udo_frame::datagram::DatagramHeader;
use udo_frame::{encode_response_datagram, Response, HEADER_SIZE};
use udo_transport::codes;

const MAGIC: u32 = 0x66CC_AA55;

/// UDP device answering from an in-memory object table until idle.
/// Returns the final table.
fn simulator(max_payload: u32) -> (SocketAddr, JoinHandle<HashMap<u16, Vec<u8>>>) {
    let mut objects: HashMap<u16, Vec<u8>> = HashMap::new();
    objects.insert(0x0000, MAGIC.to_le_bytes().to_vec());
    objects.insert(0x0001, max_payload.to_le_bytes().to_vec());
    objects.insert(0x1500, vec![0; 4]);
    objects.insert(0x2000, (0..100u8).collect());

    let socket = UdpSocket::bind("127.0.0.1:0").expect("simulator should bind");
    socket
        .set_read_timeout(Some(Duration::from_millis(1500)))
        .expect("timeout should set");
    let addr = socket.local_addr().expect("simulator address");

    let handle = thread::spawn(move || {
        let mut buf = [0u8; 2048];
        while let Ok((len, from)) = socket.recv_from(&mut buf) {
            let Ok(head) = DatagramHeader::decode(&buf[..len]) else {
                continue;
            };
            let body = &buf[HEADER_SIZE..len];
            let offset = head.offset as usize;
            let resp = match objects.get_mut(&head.index) {
                None => Response::error(head.index, head.offset, codes::WRONG_INDEX),
                Some(object) if head.is_write() => {
                    if offset + body.len() > object.len() {
                        Response::error(head.index, head.offset, codes::WRITE_BOUNDS)
                    } else {
                        object[offset..offset + body.len()].copy_from_slice(body);
                        Response::ok(head.index, head.offset, Vec::new())
                    }
                }
                Some(object) => {
                    let start = offset.min(object.len());
                    let end = object.len().min(start + head.len());
                    Response::ok(head.index, head.offset, object[start..end].to_vec())
                }
            };
            let mut out = BytesMut::new();
            if encode_response_datagram(head.id, head.is_write(), &resp, &mut out).is_ok() {
                let _ = socket.send_to(&out, from);
            }
        }
        objects
    });

    (addr, handle)
}

fn udo(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_udo"))
        .args(["--log-level", "error", "--format", "json"])
        .args(args)
        .output()
        .expect("udo should run")
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be json")
}

#[test]
fn info_reports_handshake() {
    let (addr, _device) = simulator(256);
    let target = format!("ip:{addr}");

    let output = udo(&["info", &target]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let info = json(&output);
    assert_eq!(info["protocol"], "ip");
    assert_eq!(info["magic"], "66CCAA55");
    assert_eq!(info["max_payload_size"], 256);
    assert_eq!(info["connected"], true);
}

#[test]
fn write_then_read_scalar() {
    let (addr, device) = simulator(64);
    let target = format!("ip:{addr}");

    let output = udo(&["write", &target, "1500", "0x0F0FF00F"]);
    assert!(output.status.success());
    assert_eq!(json(&output)["hex"], "0F F0 0F 0F");

    let output = udo(&["read", &target, "1500", "--as", "u32"]);
    assert!(output.status.success());
    assert_eq!(json(&output)["value"], 0x0F0F_F00F);

    let output = udo(&["write", &target, "1500", "-2", "--width", "2", "--offset", "2"]);
    assert!(output.status.success());

    let output = udo(&["read", &target, "0x1500", "--offset", "2", "--as", "i16"]);
    assert_eq!(json(&output)["value"], -2);

    let objects = device.join().expect("simulator thread");
    assert_eq!(objects[&0x1500], vec![0x0F, 0xF0, 0xFE, 0xFF]);
}

#[test]
fn read_blob_spans_chunks() {
    let (addr, _device) = simulator(64);
    let target = format!("ip:{addr}");

    let output = udo(&["read", &target, "2000", "--len", "100"]);
    assert!(output.status.success());
    let out = json(&output);
    assert_eq!(out["len"], 100);
    assert_eq!(out["kind"], "hex");
    assert!(out["hex"].as_str().unwrap_or_default().starts_with("00 01 02"));
}

#[test]
fn device_error_returns_70() {
    let (addr, _device) = simulator(64);
    let output = udo(&["read", &format!("ip:{addr}"), "6666", "--as", "u8"]);
    assert_eq!(output.status.code(), Some(70));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("WRONG_INDEX"), "stderr: {stderr}");
}

#[test]
fn silent_device_returns_124() {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("socket should bind");
    let addr = socket.local_addr().expect("socket address");

    let output = udo(&[
        "info",
        &format!("ip:{addr}"),
        "--timeout",
        "50ms",
        "--tries",
        "2",
    ]);
    assert_eq!(output.status.code(), Some(124));
}

#[test]
fn bad_target_is_usage_error() {
    let output = udo(&["info", "tcp:localhost"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_udo"))
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("udo {}", env!("CARGO_PKG_VERSION"))
    );
}
