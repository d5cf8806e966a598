//! TLS record sniffing
//!
//! Decides from the first bytes of a connection whether the peer opened with
//! a TLS handshake record. Works on borrowed slices only: the caller keeps the
//! bytes and its read position.

use log::{debug, trace};

/// TLS record content type for handshake messages
pub const TLS_HANDSHAKE_CONTENT_TYPE: u8 = 0x16;

/// Length of a TLS record header (type, major, minor, length)
pub const TLS_RECORD_HEADER_LEN: usize = 5;

/// Largest record payload a peer may legitimately announce (TLSCiphertext)
pub const MAX_TLS_RECORD_LEN: usize = 16384 + 2048;

/// Protocol detection result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionResult {
    /// TLS protocol detected
    Tls,
    /// Non-TLS protocol detected
    NonTls(String),
    /// Need more data to determine protocol
    NeedMoreData,
}

/// Protocol information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolInfo {
    /// Protocol name
    pub name: String,
    /// Protocol version (if available)
    pub version: Option<String>,
}

/// TLS protocol detector
///
/// Looks for the TLS handshake record type (0x16), a known SSLv3/TLS version
/// and a plausible record length.
#[derive(Debug, Clone)]
pub struct TlsDetector {
    /// Minimum bytes required for detection
    min_bytes: usize,
}

impl Default for TlsDetector {
    fn default() -> Self {
        Self {
            min_bytes: TLS_RECORD_HEADER_LEN,
        }
    }
}

impl TlsDetector {
    /// Minimum number of bytes `detect` needs before it can decide
    pub fn min_bytes(&self) -> usize {
        self.min_bytes
    }

    /// Check if data starts with a TLS handshake record header
    ///
    /// # Parameters
    ///
    /// * `data` - Data to examine
    ///
    /// # Returns
    ///
    /// Returns the detection result
    pub fn detect(&self, data: &[u8]) -> DetectionResult {
        if data.len() < self.min_bytes {
            trace!("Not enough data to determine protocol: got {} bytes, need {}", data.len(), self.min_bytes);
            return DetectionResult::NeedMoreData;
        }

        if data[0] != TLS_HANDSHAKE_CONTENT_TYPE {
            let reason = format!("first byte is {:#04x}, expected {:#04x}", data[0], TLS_HANDSHAKE_CONTENT_TYPE);
            debug!("Non-TLS protocol detected: {}", reason);
            return DetectionResult::NonTls(reason);
        }

        // SSLv3 (3.0) through TLS 1.3 record versions
        let major = data[1];
        let minor = data[2];
        if major != 0x03 || minor > 0x04 {
            trace!("Invalid TLS version: {}.{}", major, minor);
            return DetectionResult::NonTls(format!("invalid TLS version {}.{}", major, minor));
        }

        let record_length = u16::from_be_bytes([data[3], data[4]]) as usize;
        if record_length == 0 || record_length > MAX_TLS_RECORD_LEN {
            trace!("Invalid TLS record length: {}", record_length);
            return DetectionResult::NonTls(format!("invalid TLS record length {}", record_length));
        }

        trace!("TLS handshake record detected ({} bytes announced)", record_length);
        DetectionResult::Tls
    }

    /// Describe the protocol of a detected TLS record
    pub fn protocol_info(&self, data: &[u8]) -> Option<ProtocolInfo> {
        if self.detect(data) != DetectionResult::Tls {
            return None;
        }

        Some(ProtocolInfo {
            name: "TLS".to_string(),
            version: Some(version_name(data[1], data[2])),
        })
    }
}

/// Returns true if `data` starts with a TLS handshake record header
///
/// Fewer than [`TLS_RECORD_HEADER_LEN`] bytes never match; callers are
/// expected to wait for more data instead.
pub fn is_tls(data: &[u8]) -> bool {
    TlsDetector::default().detect(data) == DetectionResult::Tls
}

fn version_name(major: u8, minor: u8) -> String {
    match (major, minor) {
        (0x03, 0x00) => "SSLv3".to_string(),
        (0x03, 0x01) => "TLSv1.0".to_string(),
        (0x03, 0x02) => "TLSv1.1".to_string(),
        (0x03, 0x03) => "TLSv1.2".to_string(),
        (0x03, 0x04) => "TLSv1.3".to_string(),
        _ => format!("Unknown ({}.{})", major, minor),
    }
}
