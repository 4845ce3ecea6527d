//! Response fingerprints and measurement runs.
//!
//! A [`ResponseFingerprint`] is the summary of how a peer reacted to one
//! crafted vector. A [`ResponseMap`] is one complete measurement run: one
//! entry per vector, in vector-sequence order, where a missing fingerprint
//! means the measurement itself failed (timeout, reset) rather than the peer
//! staying silent.

pub mod equality;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use equality::{EqualityError, MapComparison, compare, compare_all, compare_maps};

/// Stable identity of a vector within its configuration's vector sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorId(pub u32);

impl fmt::Display for VectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One crafted protocol-level input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vector {
    pub id: VectorId,
    pub name: String,
}

impl Vector {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: VectorId(id),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Warning,
    Fatal,
}

/// Alert descriptions a peer may answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertDescription {
    CloseNotify,
    UnexpectedMessage,
    BadRecordMac,
    DecryptionFailed,
    RecordOverflow,
    DecompressionFailure,
    HandshakeFailure,
    BadCertificate,
    UnsupportedCertificate,
    CertificateRevoked,
    CertificateExpired,
    CertificateUnknown,
    IllegalParameter,
    UnknownCa,
    AccessDenied,
    DecodeError,
    DecryptError,
    ProtocolVersion,
    InsufficientSecurity,
    InternalError,
    InappropriateFallback,
    UserCanceled,
    NoRenegotiation,
    UnsupportedExtension,
    /// Any description code not listed above.
    Unknown(u8),
}

/// An alert observed in the peer's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Alert {
    pub fn fatal(description: AlertDescription) -> Self {
        Self {
            level: AlertLevel::Fatal,
            description,
        }
    }

    pub fn warning(description: AlertDescription) -> Self {
        Self {
            level: AlertLevel::Warning,
            description,
        }
    }
}

/// Handshake and record-level message types observed in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    HelloRequest,
    ClientHello,
    ServerHello,
    HelloVerifyRequest,
    NewSessionTicket,
    Certificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    CertificateVerify,
    ClientKeyExchange,
    Finished,
    ChangeCipherSpec,
    Alert,
    ApplicationData,
    Heartbeat,
    Unknown,
}

/// Coarse response-latency bucket assigned by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimingBucket(pub u32);

/// Comparable snapshot of how the peer reacted to one vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResponseFingerprint {
    /// Whether the connection was still open after the response was received.
    pub socket_open: bool,
    /// The alert the peer sent, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
    /// Received message types, in arrival order.
    #[serde(default)]
    pub messages: Vec<MessageType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<TimingBucket>,
}

impl ResponseFingerprint {
    pub fn new(socket_open: bool) -> Self {
        Self {
            socket_open,
            alert: None,
            messages: Vec::new(),
            timing: None,
        }
    }

    #[must_use]
    pub fn with_alert(mut self, alert: Alert) -> Self {
        self.alert = Some(alert);
        self
    }

    #[must_use]
    pub fn with_messages(mut self, messages: impl IntoIterator<Item = MessageType>) -> Self {
        self.messages = messages.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_timing(mut self, bucket: u32) -> Self {
        self.timing = Some(TimingBucket(bucket));
        self
    }

    /// Short human-readable rendering for report tables.
    pub fn to_human_readable(&self) -> String {
        let mut parts = Vec::new();
        if !self.messages.is_empty() {
            let names: Vec<String> = self.messages.iter().map(|m| format!("{m:?}")).collect();
            parts.push(names.join(","));
        }
        if let Some(alert) = self.alert {
            parts.push(format!("{:?}({:?})", alert.level, alert.description));
        }
        parts.push(if self.socket_open { "open" } else { "closed" }.to_string());
        if let Some(TimingBucket(bucket)) = self.timing {
            parts.push(format!("t{bucket}"));
        }
        parts.join(" ")
    }
}

/// The fingerprint recorded for one vector within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorResponse {
    pub vector_id: VectorId,
    /// `None` when the measurement for this vector failed.
    pub fingerprint: Option<ResponseFingerprint>,
}

/// One complete measurement run over a configuration's vector sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseMap {
    entries: Vec<VectorResponse>,
}

impl ResponseMap {
    pub fn new(entries: Vec<VectorResponse>) -> Self {
        Self { entries }
    }

    /// A run in which every measurement failed.
    pub fn absent(vectors: &[Vector]) -> Self {
        Self {
            entries: vectors
                .iter()
                .map(|vector| VectorResponse {
                    vector_id: vector.id,
                    fingerprint: None,
                })
                .collect(),
        }
    }

    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (VectorId, Option<ResponseFingerprint>)>,
    ) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(vector_id, fingerprint)| VectorResponse {
                    vector_id,
                    fingerprint,
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[VectorResponse] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn vector_ids(&self) -> impl Iterator<Item = VectorId> + '_ {
        self.entries.iter().map(|entry| entry.vector_id)
    }

    pub fn get(&self, vector_id: VectorId) -> Option<&VectorResponse> {
        self.entries.iter().find(|entry| entry.vector_id == vector_id)
    }

    pub fn absent_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.fingerprint.is_none())
            .count()
    }

    /// A run is erroneous when any measurement failed or it carries no
    /// entries at all.
    pub fn is_erroneous(&self) -> bool {
        self.entries.is_empty() || self.absent_count() > 0
    }

    /// Whether this run covers exactly `expected`, in order.
    pub fn matches_sequence(&self, expected: &[VectorId]) -> bool {
        self.entries.len() == expected.len()
            && self
                .entries
                .iter()
                .zip(expected)
                .all(|(entry, id)| entry.vector_id == *id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vectors() -> Vec<Vector> {
        vec![Vector::new(0, "valid"), Vector::new(1, "invalid-padding")]
    }

    #[test]
    fn test_absent_map_is_erroneous() {
        let map = ResponseMap::absent(&vectors());
        assert_eq!(map.len(), 2);
        assert_eq!(map.absent_count(), 2);
        assert!(map.is_erroneous());
    }

    #[test]
    fn test_empty_map_is_erroneous() {
        assert!(ResponseMap::default().is_erroneous());
    }

    #[test]
    fn test_sequence_matching_is_order_sensitive() {
        let fp = ResponseFingerprint::new(true);
        let map = ResponseMap::from_pairs([
            (VectorId(1), Some(fp.clone())),
            (VectorId(0), Some(fp)),
        ]);
        assert!(map.matches_sequence(&[VectorId(1), VectorId(0)]));
        assert!(!map.matches_sequence(&[VectorId(0), VectorId(1)]));
        assert!(!map.matches_sequence(&[VectorId(1)]));
    }

    #[test]
    fn test_fingerprint_json_shape() {
        let fp = ResponseFingerprint::new(false)
            .with_alert(Alert::fatal(AlertDescription::DecryptError))
            .with_messages([MessageType::Alert]);
        let json = serde_json::to_value(&fp).unwrap();
        assert_eq!(json["socket_open"], false);
        assert_eq!(json["alert"]["description"], "decrypt_error");
        assert_eq!(json["messages"][0], "alert");
        assert!(json.get("timing").is_none());
    }

    #[test]
    fn test_human_readable_rendering() {
        let fp = ResponseFingerprint::new(false)
            .with_alert(Alert::fatal(AlertDescription::BadRecordMac))
            .with_messages([MessageType::Alert])
            .with_timing(2);
        assert_eq!(fp.to_human_readable(), "Alert Fatal(BadRecordMac) closed t2");
    }
}
