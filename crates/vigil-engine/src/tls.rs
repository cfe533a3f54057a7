//! Certificate expiry inspection over a raw TLS handshake.
//!
//! Offers a TLS 1.2 ClientHello (no 1.3 suites), so a conforming server
//! answers with a plaintext Certificate message. The leaf certificate's
//! validity is pulled out of the DER bytes directly; no TLS stack is linked
//! for a probe that only needs `notAfter`.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;
use vigil_core::error::ProbeError;

/// Looks up when the certificate served at host:port expires.
#[async_trait]
pub trait CertificateExpiry: Send + Sync {
    async fn not_after(&self, host: &str, port: u16) -> Result<DateTime<Utc>, ProbeError>;
}

/// Fixed-expiry inspector for tests and dry runs.
pub struct StaticExpiry {
    not_after: DateTime<Utc>,
}

impl StaticExpiry {
    pub fn new(not_after: DateTime<Utc>) -> Self {
        Self { not_after }
    }

    pub fn days_from_now(days: i64) -> Self {
        Self {
            not_after: Utc::now() + chrono::Duration::days(days),
        }
    }
}

#[async_trait]
impl CertificateExpiry for StaticExpiry {
    async fn not_after(&self, _host: &str, _port: u16) -> Result<DateTime<Utc>, ProbeError> {
        Ok(self.not_after)
    }
}

/// Production inspector: raw TCP + TLS 1.2 handshake.
pub struct TlsExpiryInspector {
    timeout: Duration,
}

impl TlsExpiryInspector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn fetch_leaf_certificate(&self, host: &str, port: u16) -> Result<Vec<u8>, ProbeError> {
        let addr = format!("{host}:{port}");
        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| ProbeError::Unreachable(format!("{addr}: {e}")))?
            .next()
            .ok_or_else(|| ProbeError::Unreachable(format!("{addr}: no address")))?;

        let mut stream = TcpStream::connect_timeout(&socket_addr, self.timeout)
            .map_err(|e| ProbeError::Unreachable(format!("{addr}: {e}")))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| ProbeError::Io(e.to_string()))?;
        stream
            .set_write_timeout(Some(self.timeout))
            .map_err(|e| ProbeError::Io(e.to_string()))?;

        stream
            .write_all(&build_client_hello(host))
            .map_err(|e| ProbeError::Io(format!("{addr}: {e}")))?;

        // Read handshake records until the Certificate message shows up.
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = stream
                .read(&mut chunk)
                .map_err(|e| ProbeError::Io(format!("{addr}: {e}")))?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(cert) = extract_leaf_certificate(&buf) {
                debug!(host, port, der_len = cert.len(), "Leaf certificate received");
                return Ok(cert);
            }
            if buf.len() > 256 * 1024 {
                break;
            }
        }

        Err(ProbeError::Io(format!(
            "{addr}: no certificate message in handshake"
        )))
    }
}

#[async_trait]
impl CertificateExpiry for TlsExpiryInspector {
    async fn not_after(&self, host: &str, port: u16) -> Result<DateTime<Utc>, ProbeError> {
        let host_owned = host.to_string();
        let timeout = self.timeout;

        // Blocking socket I/O runs off the async workers.
        let der = tokio::task::spawn_blocking(move || {
            TlsExpiryInspector { timeout }.fetch_leaf_certificate(&host_owned, port)
        })
        .await
        .map_err(|e| ProbeError::Io(e.to_string()))??;

        let (_not_before, not_after) = parse_validity(&der)
            .ok_or_else(|| ProbeError::Io("no validity period in certificate".to_string()))?;
        Ok(not_after)
    }
}

/// Minimal TLS 1.2 ClientHello with SNI. TLS 1.3 suites are deliberately not
/// offered: a 1.3 server would encrypt its Certificate message.
fn build_client_hello(hostname: &str) -> Vec<u8> {
    let cipher_suites: &[u16] = &[
        0xC02C, // TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384
        0xC02B, // TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
        0xC030, // TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384
        0xC02F, // TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
        0xCCA9, // TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305
        0xCCA8, // TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305
        0x009E, // TLS_DHE_RSA_WITH_AES_128_GCM_SHA256
        0x009F, // TLS_DHE_RSA_WITH_AES_256_GCM_SHA256
        0x002F, // TLS_RSA_WITH_AES_128_CBC_SHA
        0x0035, // TLS_RSA_WITH_AES_256_CBC_SHA
    ];

    let mut body = Vec::new();
    body.extend_from_slice(&[0x03, 0x03]); // TLS 1.2

    let random: Vec<u8> = (0..32).map(|_| rand::random::<u8>()).collect();
    body.extend_from_slice(&random);

    body.push(0); // empty session id

    let cs_len = (cipher_suites.len() * 2) as u16;
    body.extend_from_slice(&cs_len.to_be_bytes());
    for cs in cipher_suites {
        body.extend_from_slice(&cs.to_be_bytes());
    }

    body.push(1); // compression methods
    body.push(0); // null only

    let mut extensions = Vec::new();

    // SNI
    let sni_name = hostname.as_bytes();
    let sni_list_len = (sni_name.len() + 3) as u16;
    let sni_ext_len = (sni_list_len + 2) as u16;
    extensions.extend_from_slice(&[0x00, 0x00]);
    extensions.extend_from_slice(&sni_ext_len.to_be_bytes());
    extensions.extend_from_slice(&sni_list_len.to_be_bytes());
    extensions.push(0);
    extensions.extend_from_slice(&(sni_name.len() as u16).to_be_bytes());
    extensions.extend_from_slice(sni_name);

    // supported_groups: x25519, secp256r1, secp384r1
    extensions.extend_from_slice(&[0x00, 0x0A]);
    extensions.extend_from_slice(&[0x00, 0x08]);
    extensions.extend_from_slice(&[0x00, 0x06]);
    extensions.extend_from_slice(&[0x00, 0x1D, 0x00, 0x17, 0x00, 0x18]);

    // signature_algorithms: common RSA/ECDSA SHA-2 schemes
    extensions.extend_from_slice(&[0x00, 0x0D]);
    extensions.extend_from_slice(&[0x00, 0x0A]);
    extensions.extend_from_slice(&[0x00, 0x08]);
    extensions.extend_from_slice(&[0x04, 0x01, 0x05, 0x01, 0x04, 0x03, 0x05, 0x03]);

    let ext_len = extensions.len() as u16;
    body.extend_from_slice(&ext_len.to_be_bytes());
    body.extend_from_slice(&extensions);

    let mut handshake = Vec::new();
    handshake.push(0x01); // ClientHello
    let hs_len = body.len() as u32;
    handshake.push((hs_len >> 16) as u8);
    handshake.push((hs_len >> 8) as u8);
    handshake.push(hs_len as u8);
    handshake.extend_from_slice(&body);

    let mut record = Vec::new();
    record.push(0x16); // Handshake
    record.extend_from_slice(&[0x03, 0x01]); // record-layer compat version
    let rec_len = handshake.len() as u16;
    record.extend_from_slice(&rec_len.to_be_bytes());
    record.extend_from_slice(&handshake);

    record
}

/// Walk TLS records, reassemble the handshake stream, and return the first
/// certificate of the Certificate message (type 11), if complete.
fn extract_leaf_certificate(data: &[u8]) -> Option<Vec<u8>> {
    // Concatenate handshake-record payloads; messages may span records.
    let mut handshake = Vec::new();
    let mut pos = 0;
    while pos + 5 <= data.len() {
        let record_type = data[pos];
        let record_len = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as usize;
        let end = pos + 5 + record_len;
        if end > data.len() {
            break;
        }
        if record_type == 0x16 {
            handshake.extend_from_slice(&data[pos + 5..end]);
        }
        pos = end;
    }

    // Walk handshake messages for type 11 (Certificate).
    let mut pos = 0;
    while pos + 4 <= handshake.len() {
        let msg_type = handshake[pos];
        let msg_len = u32::from_be_bytes([0, handshake[pos + 1], handshake[pos + 2], handshake[pos + 3]])
            as usize;
        let end = pos + 4 + msg_len;
        if end > handshake.len() {
            return None; // message incomplete, caller reads more
        }
        if msg_type == 0x0B {
            let body = &handshake[pos + 4..end];
            // certificate_list length (3 bytes), then first entry length (3 bytes)
            if body.len() < 6 {
                return None;
            }
            let first_len =
                u32::from_be_bytes([0, body[3], body[4], body[5]]) as usize;
            if body.len() < 6 + first_len {
                return None;
            }
            return Some(body[6..6 + first_len].to_vec());
        }
        pos = end;
    }
    None
}

/// Scan DER for the Validity sequence: the first adjacent pair of UTCTime
/// (0x17) or GeneralizedTime (0x18) values is (notBefore, notAfter).
fn parse_validity(der: &[u8]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let mut pos = 0;
    while pos + 2 <= der.len() {
        if let Some((first, first_end)) = read_time(der, pos) {
            if let Some((second, _)) = read_time(der, first_end) {
                return Some((first, second));
            }
        }
        pos += 1;
    }
    None
}

/// Read a UTCTime or GeneralizedTime at `pos`; returns the parsed time and
/// the offset just past it.
fn read_time(der: &[u8], pos: usize) -> Option<(DateTime<Utc>, usize)> {
    let tag = *der.get(pos)?;
    let len = *der.get(pos + 1)? as usize;
    let start = pos + 2;
    let end = start + len;
    let raw = der.get(start..end)?;

    let text = std::str::from_utf8(raw).ok()?;
    let parsed = match (tag, len) {
        // YYMMDDHHMMSSZ
        (0x17, 13) if text.ends_with('Z') => {
            let yy: i32 = text[0..2].parse().ok()?;
            let year = if yy < 50 { 2000 + yy } else { 1900 + yy };
            build_time(year, &text[2..12])?
        }
        // YYYYMMDDHHMMSSZ
        (0x18, 15) if text.ends_with('Z') => {
            let year: i32 = text[0..4].parse().ok()?;
            build_time(year, &text[4..14])?
        }
        _ => return None,
    };
    Some((parsed, end))
}

fn build_time(year: i32, rest: &str) -> Option<DateTime<Utc>> {
    if rest.len() != 10 || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let month: u32 = rest[0..2].parse().ok()?;
    let day: u32 = rest[2..4].parse().ok()?;
    let hour: u32 = rest[4..6].parse().ok()?;
    let minute: u32 = rest[6..8].parse().ok()?;
    let second: u32 = rest[8..10].parse().ok()?;
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utctime(text: &str) -> Vec<u8> {
        let mut out = vec![0x17, text.len() as u8];
        out.extend_from_slice(text.as_bytes());
        out
    }

    fn generalized(text: &str) -> Vec<u8> {
        let mut out = vec![0x18, text.len() as u8];
        out.extend_from_slice(text.as_bytes());
        out
    }

    #[test]
    fn test_parse_validity_utctime_pair() {
        let mut der = vec![0x30, 0x82, 0x01, 0x00]; // arbitrary leading bytes
        der.extend(utctime("240101000000Z"));
        der.extend(utctime("260101000000Z"));

        let (not_before, not_after) = parse_validity(&der).unwrap();
        assert_eq!(not_before, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(not_after, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_validity_generalized_time() {
        let mut der = vec![0x02, 0x01, 0x01];
        der.extend(generalized("20301231235959Z"));
        der.extend(generalized("20401231235959Z"));

        let (_, not_after) = parse_validity(&der).unwrap();
        assert_eq!(
            not_after,
            Utc.with_ymd_and_hms(2040, 12, 31, 23, 59, 59).unwrap()
        );
    }

    #[test]
    fn test_utctime_century_split() {
        let mut der = Vec::new();
        der.extend(utctime("990101000000Z")); // 1999
        der.extend(utctime("490101000000Z")); // 2049
        let (not_before, not_after) = parse_validity(&der).unwrap();
        assert_eq!(not_before.format("%Y").to_string(), "1999");
        assert_eq!(not_after.format("%Y").to_string(), "2049");
    }

    #[test]
    fn test_parse_validity_rejects_garbage() {
        assert!(parse_validity(&[0x17, 0x0D, 0xFF, 0xFE, 0xFD]).is_none());
        assert!(parse_validity(b"plain text, no time tags").is_none());
    }

    #[test]
    fn test_extract_leaf_certificate_from_records() {
        // Build a Certificate handshake message with one 4-byte "cert".
        let cert = [0xDE, 0xAD, 0xBE, 0xEF];
        let mut body = Vec::new();
        body.extend_from_slice(&[0x00, 0x00, 0x07]); // certificate_list length
        body.extend_from_slice(&[0x00, 0x00, 0x04]); // first entry length
        body.extend_from_slice(&cert);

        let mut handshake = vec![0x0B, 0x00, 0x00, body.len() as u8];
        handshake.extend_from_slice(&body);

        let mut record = vec![0x16, 0x03, 0x03];
        record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
        record.extend_from_slice(&handshake);

        assert_eq!(extract_leaf_certificate(&record).unwrap(), cert);
    }

    #[test]
    fn test_extract_waits_for_complete_message() {
        // Record announces more bytes than provided: incomplete, no cert yet.
        let record = vec![0x16, 0x03, 0x03, 0x00, 0x40, 0x0B, 0x00];
        assert!(extract_leaf_certificate(&record).is_none());
    }

    #[test]
    fn test_client_hello_is_tls12_handshake_record() {
        let hello = build_client_hello("example.com");
        assert_eq!(hello[0], 0x16);
        assert_eq!(hello[5], 0x01);
        // SNI payload carries the hostname verbatim.
        let needle = b"example.com";
        assert!(hello.windows(needle.len()).any(|w| w == needle));
    }
}
