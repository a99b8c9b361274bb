//! String session encoding tests.

use std::net::SocketAddr;

use layer_login::string_session::CURRENT_VERSION;
use layer_login::{StringSession, StringSessionError};

fn key() -> [u8; 256] {
    let mut k = [0u8; 256];
    for (i, b) in k.iter_mut().enumerate() { *b = i as u8; }
    k
}

fn v4() -> StringSession {
    StringSession {
        dc_id:    2,
        addr:     "149.154.167.51:443".parse().unwrap(),
        auth_key: key(),
    }
}

#[test]
fn v4_string_has_expected_length() {
    let s = v4().encode();
    assert!(s.starts_with(CURRENT_VERSION));
    // 263 payload bytes -> 352 base64 chars, plus the version prefix.
    assert_eq!(s.len(), 353);
    assert!(!s.contains('+') && !s.contains('/'));
}

#[test]
fn decodes_what_it_encodes() {
    let original = v4();
    let back: StringSession = original.to_string().parse().unwrap();
    assert_eq!(back, original);
}

#[test]
fn ipv6_layout() {
    let sess = StringSession {
        dc_id:    5,
        addr:     "[2001:b28:f23f:f005::a]:443".parse::<SocketAddr>().unwrap(),
        auth_key: [0xab; 256],
    };
    let back = StringSession::decode(&sess.encode()).unwrap();
    assert_eq!(back.dc_id, 5);
    assert!(back.addr.is_ipv6());
    assert_eq!(back.addr.port(), 443);
}

#[test]
fn surrounding_whitespace_is_ignored() {
    let s = format!("  {}\n", v4().encode());
    assert_eq!(StringSession::decode(&s).unwrap(), v4());
}

#[test]
fn rejects_bad_input() {
    assert_eq!(StringSession::decode(""), Err(StringSessionError::Empty));
    assert_eq!(StringSession::decode("2AAAA"), Err(StringSessionError::UnsupportedVersion('2')));
    assert!(matches!(StringSession::decode("1!!!"), Err(StringSessionError::Base64(_))));
    assert_eq!(StringSession::decode("1AAAA"), Err(StringSessionError::Length(3)));
}

#[test]
fn debug_hides_auth_key() {
    let dbg = format!("{:?}", v4());
    assert!(dbg.contains("[256 bytes]"));
    assert!(!dbg.contains("255"));
}
