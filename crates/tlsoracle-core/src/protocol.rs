//! Protocol version and cipher suite descriptors.
//!
//! Cipher suites are carried by their IANA name (`TLS_DHE_RSA_WITH_AES_128_CBC_SHA`).
//! Every property the enumerator filters on (key exchange, CBC mode, PSK) is
//! derived from that name, so previously-observed target capabilities can be
//! fed in verbatim from earlier probes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Protocol versions a target may have been observed to support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolVersion {
    Ssl2,
    Ssl3,
    Tls10,
    Tls11,
    Tls12,
    Tls13,
    Dtls10,
    Dtls12,
}

impl ProtocolVersion {
    pub fn is_ssl(self) -> bool {
        matches!(self, ProtocolVersion::Ssl2 | ProtocolVersion::Ssl3)
    }

    pub fn is_tls13(self) -> bool {
        self == ProtocolVersion::Tls13
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolVersion::Ssl2 => "SSL2",
            ProtocolVersion::Ssl3 => "SSL3",
            ProtocolVersion::Tls10 => "TLS10",
            ProtocolVersion::Tls11 => "TLS11",
            ProtocolVersion::Tls12 => "TLS12",
            ProtocolVersion::Tls13 => "TLS13",
            ProtocolVersion::Dtls10 => "DTLS10",
            ProtocolVersion::Dtls12 => "DTLS12",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key exchange family of a cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyExchange {
    /// Static RSA key transport (`TLS_RSA_WITH_*`, `TLS_RSA_PSK_WITH_*`).
    Rsa,
    /// Finite-field Diffie-Hellman, static or ephemeral (`DH_*`, `DHE_*`).
    Dh,
    /// Elliptic-curve Diffie-Hellman (`ECDH_*`, `ECDHE_*`).
    Ecdh,
    /// Plain pre-shared key.
    Psk,
    /// Anything else (SRP, KRB5, GOST, ...).
    Other,
    /// TLS 1.3 suites do not name a key exchange.
    Unspecified,
}

/// A cipher suite identified by its IANA name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CipherSuite(String);

impl CipherSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Everything between the protocol prefix and `_WITH_`, e.g. `DHE_RSA`.
    fn key_exchange_part(&self) -> Option<&str> {
        let rest = self
            .0
            .strip_prefix("TLS_")
            .or_else(|| self.0.strip_prefix("SSL_"))?;
        rest.split_once("_WITH_").map(|(kx, _)| kx)
    }

    fn cipher_part(&self) -> &str {
        self.0
            .split_once("_WITH_")
            .map_or(self.0.as_str(), |(_, cipher)| cipher)
    }

    pub fn key_exchange(&self) -> KeyExchange {
        let Some(kx) = self.key_exchange_part() else {
            return KeyExchange::Unspecified;
        };
        let first = kx.split('_').next().unwrap_or_default();
        match first {
            "RSA" => KeyExchange::Rsa,
            "DH" | "DHE" => KeyExchange::Dh,
            "ECDH" | "ECDHE" => KeyExchange::Ecdh,
            "PSK" => KeyExchange::Psk,
            _ => KeyExchange::Other,
        }
    }

    /// Whether the suite's key exchange involves a finite-field DH computation.
    pub fn uses_dh(&self) -> bool {
        self.key_exchange() == KeyExchange::Dh
    }

    pub fn is_psk(&self) -> bool {
        self.key_exchange_part()
            .is_some_and(|kx| kx.split('_').any(|part| part == "PSK"))
    }

    pub fn is_cbc(&self) -> bool {
        self.cipher_part().split('_').any(|part| part == "CBC")
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CipherSuite {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
