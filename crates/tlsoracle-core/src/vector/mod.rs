//! Test-configuration enumeration.
//!
//! Each oracle family is described by a [`ProbeFamily`]: which protocol
//! versions and cipher suites are structurally eligible, which vector
//! generators to run under which conditions, and which record generator the
//! scan detail selects. [`enumerate`] turns a family plus the capabilities
//! earlier probes established into the list of [`TestConfiguration`]s.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ScanDetail;
use crate::protocol::{CipherSuite, KeyExchange, ProtocolVersion};

/// The oracle family a probe looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeKind {
    /// CBC padding oracle.
    PaddingOracle,
    /// RSA PKCS#1 v1.5 oracle.
    Bleichenbacher,
    /// DH master-secret derivation oracle (leading zero bytes of the premaster secret).
    MasterSecret,
}

impl ProbeKind {
    pub const ALL: [ProbeKind; 3] = [
        ProbeKind::PaddingOracle,
        ProbeKind::Bleichenbacher,
        ProbeKind::MasterSecret,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProbeKind::PaddingOracle => "padding-oracle",
            ProbeKind::Bleichenbacher => "bleichenbacher",
            ProbeKind::MasterSecret => "master-secret",
        }
    }

    pub fn family(self) -> &'static ProbeFamily {
        match self {
            ProbeKind::PaddingOracle => &PADDING_ORACLE,
            ProbeKind::Bleichenbacher => &BLEICHENBACHER,
            ProbeKind::MasterSecret => &MASTER_SECRET,
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown probe kind string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseProbeKindError(String);

impl fmt::Display for ParseProbeKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown probe kind: {}", self.0)
    }
}

impl std::error::Error for ParseProbeKindError {}

impl FromStr for ProbeKind {
    type Err = ParseProbeKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "padding-oracle" | "padding" => Ok(ProbeKind::PaddingOracle),
            "bleichenbacher" => Ok(ProbeKind::Bleichenbacher),
            "master-secret" => Ok(ProbeKind::MasterSecret),
            _ => Err(ParseProbeKindError(s.to_owned())),
        }
    }
}

/// Which family of crafted inputs a configuration sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VectorGeneratorKind {
    /// Padding vectors hidden in the Finished message.
    Finished,
    /// Padding vectors in application data, sized after what the peer sent.
    ClassicDynamic,
    /// Padding vectors carried by a close_notify alert record.
    CloseNotify,
    /// Bleichenbacher: ClientKeyExchange, ChangeCipherSpec, Finished.
    CkeCcsFin,
    /// Bleichenbacher: ClientKeyExchange only.
    Cke,
    /// Bleichenbacher: ClientKeyExchange, ChangeCipherSpec.
    CkeCcs,
    /// ClientKeyExchange followed directly by Finished.
    CkeFin,
}

impl VectorGeneratorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VectorGeneratorKind::Finished => "FINISHED",
            VectorGeneratorKind::ClassicDynamic => "CLASSIC_DYNAMIC",
            VectorGeneratorKind::CloseNotify => "CLOSE_NOTIFY",
            VectorGeneratorKind::CkeCcsFin => "CKE_CCS_FIN",
            VectorGeneratorKind::Cke => "CKE",
            VectorGeneratorKind::CkeCcs => "CKE_CCS",
            VectorGeneratorKind::CkeFin => "CKE_FIN",
        }
    }
}

impl fmt::Display for VectorGeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How finely the record layer of each vector is varied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordGeneratorKind {
    VeryShort,
    Short,
    Fast,
    Full,
}

impl RecordGeneratorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordGeneratorKind::VeryShort => "VERY_SHORT",
            RecordGeneratorKind::Short => "SHORT",
            RecordGeneratorKind::Fast => "FAST",
            RecordGeneratorKind::Full => "FULL",
        }
    }
}

impl fmt::Display for RecordGeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity key of one oracle test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestConfiguration {
    pub protocol_version: ProtocolVersion,
    pub cipher_suite: CipherSuite,
    pub vector_generator: VectorGeneratorKind,
    pub record_generator: RecordGeneratorKind,
}

impl fmt::Display for TestConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}/{}]",
            self.protocol_version, self.cipher_suite, self.vector_generator, self.record_generator
        )
    }
}

/// Target behavior established by earlier probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    /// The peer sent application data after the handshake.
    SendsApplicationData,
}

/// Cipher suites supported under one protocol version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSuiteList {
    pub version: ProtocolVersion,
    pub cipher_suites: Vec<CipherSuite>,
}

/// Everything the enumerator knows about the target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCapabilities {
    #[serde(default)]
    pub version_suites: Vec<VersionSuiteList>,
    #[serde(default)]
    pub observed: BTreeSet<Capability>,
}

impl TargetCapabilities {
    #[must_use]
    pub fn with_suites(
        mut self,
        version: ProtocolVersion,
        suites: impl IntoIterator<Item = impl Into<CipherSuite>>,
    ) -> Self {
        self.version_suites.push(VersionSuiteList {
            version,
            cipher_suites: suites.into_iter().map(Into::into).collect(),
        });
        self
    }

    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.observed.insert(capability);
        self
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.observed.contains(&capability)
    }
}

/// When a vector generator is worth running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorCondition {
    Always,
    /// Only once the capability was observed on the target.
    Requires(Capability),
    /// Only at this scan detail or above.
    AtLeast(ScanDetail),
    /// Both an observed capability and a minimum scan detail.
    RequiresAtLeast(Capability, ScanDetail),
}

impl GeneratorCondition {
    fn holds(self, capabilities: &TargetCapabilities, detail: ScanDetail) -> bool {
        match self {
            GeneratorCondition::Always => true,
            GeneratorCondition::Requires(capability) => capabilities.has(capability),
            GeneratorCondition::AtLeast(minimum) => detail.is_at_least(minimum),
            GeneratorCondition::RequiresAtLeast(capability, minimum) => {
                capabilities.has(capability) && detail.is_at_least(minimum)
            }
        }
    }
}

/// Eligibility rules and generator selection for one oracle family.
#[derive(Debug)]
pub struct ProbeFamily {
    pub version_eligible: fn(ProtocolVersion) -> bool,
    pub suite_eligible: fn(&CipherSuite) -> bool,
    pub generators: &'static [(VectorGeneratorKind, GeneratorCondition)],
    /// Record generator below and at/above `fine_from`.
    pub coarse_record: RecordGeneratorKind,
    pub fine_record: RecordGeneratorKind,
    pub fine_from: ScanDetail,
}

impl ProbeFamily {
    pub fn record_generator(&self, detail: ScanDetail) -> RecordGeneratorKind {
        if detail.is_at_least(self.fine_from) {
            self.fine_record
        } else {
            self.coarse_record
        }
    }

    pub fn vector_generators(
        &self,
        capabilities: &TargetCapabilities,
        detail: ScanDetail,
    ) -> Vec<VectorGeneratorKind> {
        self.generators
            .iter()
            .filter(|(_, condition)| condition.holds(capabilities, detail))
            .map(|(kind, _)| *kind)
            .collect()
    }
}

fn cbc_or_rsa_version(version: ProtocolVersion) -> bool {
    !version.is_ssl() && !version.is_tls13()
}

fn master_secret_version(version: ProtocolVersion) -> bool {
    matches!(
        version,
        ProtocolVersion::Tls10 | ProtocolVersion::Tls11 | ProtocolVersion::Tls12
    )
}

fn padding_suite(suite: &CipherSuite) -> bool {
    suite.is_cbc() && !suite.is_psk()
}

fn rsa_suite(suite: &CipherSuite) -> bool {
    suite.key_exchange() == KeyExchange::Rsa && !suite.is_psk()
}

fn dh_suite(suite: &CipherSuite) -> bool {
    suite.uses_dh()
}

pub static PADDING_ORACLE: ProbeFamily = ProbeFamily {
    version_eligible: cbc_or_rsa_version,
    suite_eligible: padding_suite,
    generators: &[
        (VectorGeneratorKind::Finished, GeneratorCondition::Always),
        (
            VectorGeneratorKind::ClassicDynamic,
            GeneratorCondition::Requires(Capability::SendsApplicationData),
        ),
        (
            VectorGeneratorKind::CloseNotify,
            GeneratorCondition::RequiresAtLeast(Capability::SendsApplicationData, ScanDetail::All),
        ),
    ],
    coarse_record: RecordGeneratorKind::VeryShort,
    fine_record: RecordGeneratorKind::Short,
    fine_from: ScanDetail::Normal,
};

pub static BLEICHENBACHER: ProbeFamily = ProbeFamily {
    version_eligible: cbc_or_rsa_version,
    suite_eligible: rsa_suite,
    generators: &[
        (VectorGeneratorKind::CkeCcsFin, GeneratorCondition::Always),
        (VectorGeneratorKind::Cke, GeneratorCondition::Always),
        (VectorGeneratorKind::CkeCcs, GeneratorCondition::Always),
        (
            VectorGeneratorKind::CkeFin,
            GeneratorCondition::AtLeast(ScanDetail::All),
        ),
    ],
    coarse_record: RecordGeneratorKind::Fast,
    fine_record: RecordGeneratorKind::Full,
    fine_from: ScanDetail::All,
};

pub static MASTER_SECRET: ProbeFamily = ProbeFamily {
    version_eligible: master_secret_version,
    suite_eligible: dh_suite,
    generators: &[
        (VectorGeneratorKind::CkeCcsFin, GeneratorCondition::Always),
        (
            VectorGeneratorKind::CkeFin,
            GeneratorCondition::AtLeast(ScanDetail::All),
        ),
    ],
    coarse_record: RecordGeneratorKind::Fast,
    fine_record: RecordGeneratorKind::Full,
    fine_from: ScanDetail::All,
};

/// Enumerate the configurations worth testing for `probe` on this target.
///
/// Ordering is generator kind first, then versions and suites in the order
/// the capabilities list them. Duplicate (version, suite) pairs are tested
/// once. An empty result means the probe's preconditions are not met.
pub fn enumerate(
    capabilities: &TargetCapabilities,
    detail: ScanDetail,
    probe: ProbeKind,
) -> Vec<TestConfiguration> {
    let family = probe.family();
    let record_generator = family.record_generator(detail);
    let generators = family.vector_generators(capabilities, detail);

    let mut seen = HashSet::new();
    let mut configurations = Vec::new();
    for vector_generator in generators {
        for pair in &capabilities.version_suites {
            if !(family.version_eligible)(pair.version) {
                continue;
            }
            for suite in &pair.cipher_suites {
                if !(family.suite_eligible)(suite) {
                    continue;
                }
                let configuration = TestConfiguration {
                    protocol_version: pair.version,
                    cipher_suite: suite.clone(),
                    vector_generator,
                    record_generator,
                };
                if seen.insert(configuration.clone()) {
                    configurations.push(configuration);
                }
            }
        }
    }

    debug!(
        probe = %probe,
        detail = %detail,
        count = configurations.len(),
        "Enumerated test configurations"
    );
    configurations
}
