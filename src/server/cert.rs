//! Self-signed key and certificate generation for the HTTPS listener.

use std::net::IpAddr;
use std::time::Duration;

use chrono::NaiveDateTime;
use rand::RngCore;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose,
    Ia5String, IsCa, KeyPair, KeyUsagePurpose, SanType, SerialNumber, SignatureAlgorithm,
};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rustls::ServerConfig;
use time::OffsetDateTime;

use crate::errors::{IssuanceError, ListenerError};

pub const DEFAULT_VALID_FOR: Duration = Duration::from_secs(365 * 24 * 60 * 60);
pub const DEFAULT_RSA_BITS: usize = 2048;
pub const ORGANIZATION: &str = "Acme Co";
/// Layout accepted by [`CredentialRequest::valid_from_str`], e.g. `Jan 1 15:04:05 2011`.
pub const VALID_FROM_FORMAT: &str = "%b %e %H:%M:%S %Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    P224,
    P256,
    P384,
    P521,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa { bits: usize },
    Ecdsa(Curve),
    Ed25519,
}

impl Default for KeyAlgorithm {
    fn default() -> Self {
        KeyAlgorithm::Ecdsa(Curve::P256)
    }
}

impl KeyAlgorithm {
    /// An empty name selects a 2048-bit RSA key.
    pub fn from_curve_name(name: &str) -> Result<Self, IssuanceError> {
        let curve = match name.to_ascii_uppercase().as_str() {
            "" => {
                return Ok(KeyAlgorithm::Rsa {
                    bits: DEFAULT_RSA_BITS,
                })
            }
            "P224" => Curve::P224,
            "P256" => Curve::P256,
            "P384" => Curve::P384,
            "P521" => Curve::P521,
            _ => return Err(IssuanceError::UnsupportedAlgorithm(name.to_string())),
        };
        Ok(KeyAlgorithm::Ecdsa(curve))
    }

    fn generate(self) -> Result<KeyPair, IssuanceError> {
        match self {
            KeyAlgorithm::Rsa { bits } => generate_rsa(bits),
            KeyAlgorithm::Ecdsa(Curve::P256) => generate_for(&rcgen::PKCS_ECDSA_P256_SHA256),
            KeyAlgorithm::Ecdsa(Curve::P384) => generate_for(&rcgen::PKCS_ECDSA_P384_SHA384),
            // Nothing in the signing backend speaks these curves.
            KeyAlgorithm::Ecdsa(curve @ (Curve::P224 | Curve::P521)) => Err(
                IssuanceError::UnsupportedAlgorithm(format!("{:?}", curve)),
            ),
            KeyAlgorithm::Ed25519 => generate_for(&rcgen::PKCS_ED25519),
        }
    }
}

fn generate_for(alg: &'static SignatureAlgorithm) -> Result<KeyPair, IssuanceError> {
    KeyPair::generate_for(alg).map_err(|e| IssuanceError::KeyGeneration(e.to_string()))
}

fn generate_rsa(bits: usize) -> Result<KeyPair, IssuanceError> {
    let key = rsa::RsaPrivateKey::new(&mut rand::rngs::OsRng, bits)
        .map_err(|e| IssuanceError::KeyGeneration(e.to_string()))?;
    let pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| IssuanceError::Encoding(e.to_string()))?;
    KeyPair::from_pem_and_sign_algo(&pem, &rcgen::PKCS_RSA_SHA256)
        .map_err(|e| IssuanceError::KeyGeneration(e.to_string()))
}

/// What to put in a certificate. Built with [`CredentialRequest::for_hosts`]
/// and the chained setters.
#[derive(Debug, Clone)]
pub struct CredentialRequest {
    /// Comma separated DNS names and IP literals.
    pub hosts: String,
    /// Issuance time when unset.
    pub valid_from: Option<OffsetDateTime>,
    pub valid_for: Duration,
    pub is_ca: bool,
    pub key_algorithm: KeyAlgorithm,
}

impl CredentialRequest {
    pub fn for_hosts(hosts: impl Into<String>) -> Self {
        CredentialRequest {
            hosts: hosts.into(),
            valid_from: None,
            valid_for: DEFAULT_VALID_FOR,
            is_ca: false,
            key_algorithm: KeyAlgorithm::default(),
        }
    }

    pub fn valid_from(mut self, from: OffsetDateTime) -> Self {
        self.valid_from = Some(from);
        self
    }

    /// Parses `from` as UTC in the [`VALID_FROM_FORMAT`] layout.
    pub fn valid_from_str(self, from: &str) -> Result<Self, IssuanceError> {
        let parsed = NaiveDateTime::parse_from_str(from, VALID_FROM_FORMAT).map_err(|source| {
            IssuanceError::InvalidValidFrom {
                value: from.to_string(),
                source,
            }
        })?;
        let from = OffsetDateTime::from_unix_timestamp(parsed.and_utc().timestamp())
            .map_err(|_| IssuanceError::InvalidValidity)?;
        Ok(self.valid_from(from))
    }

    pub fn valid_for(mut self, valid_for: Duration) -> Self {
        self.valid_for = valid_for;
        self
    }

    pub fn ca(mut self, is_ca: bool) -> Self {
        self.is_ca = is_ca;
        self
    }

    pub fn key_algorithm(mut self, key_algorithm: KeyAlgorithm) -> Self {
        self.key_algorithm = key_algorithm;
        self
    }

    fn host_entries(&self) -> impl Iterator<Item = &str> {
        self.hosts.split(',').map(str::trim).filter(|h| !h.is_empty())
    }
}

/// PEM encoded key (PKCS#8) and certificate. Lives in memory only.
#[derive(Clone)]
pub struct CredentialMaterial {
    pub private_key_pem: String,
    pub certificate_pem: String,
}

impl std::fmt::Debug for CredentialMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialMaterial")
            .field("private_key_pem", &"<redacted>")
            .field("certificate_pem", &self.certificate_pem)
            .finish()
    }
}

impl CredentialMaterial {
    /// Builds a rustls server configuration straight from the PEM bytes,
    /// offering `h2` and `http/1.1`.
    pub fn server_config(&self) -> Result<ServerConfig, ListenerError> {
        let certs = rustls_pemfile::certs(&mut self.certificate_pem.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ListenerError::Tls(format!("unreadable certificate: {}", e)))?;
        let key = rustls_pemfile::private_key(&mut self.private_key_pem.as_bytes())
            .map_err(|e| ListenerError::Tls(format!("unreadable private key: {}", e)))?
            .ok_or_else(|| ListenerError::Tls("no private key found".to_string()))?;

        let mut config = ServerConfig::builder_with_provider(crate::scanner::tls::crypto_provider())
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
        Ok(config)
    }
}

/// Generates a fresh key pair and a certificate signed by it.
pub fn issue(request: &CredentialRequest) -> Result<CredentialMaterial, IssuanceError> {
    if request.host_entries().next().is_none() {
        return Err(IssuanceError::MissingHost);
    }
    let valid_for = if request.valid_for.is_zero() {
        DEFAULT_VALID_FOR
    } else {
        request.valid_for
    };

    let key_pair = request.key_algorithm.generate()?;

    let not_before = request.valid_from.unwrap_or_else(OffsetDateTime::now_utc);
    let not_after = time::Duration::try_from(valid_for)
        .ok()
        .and_then(|d| not_before.checked_add(d))
        .ok_or(IssuanceError::InvalidValidity)?;

    let mut serial = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut serial);

    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::OrganizationName, ORGANIZATION);

    let mut params = CertificateParams::default();
    params.serial_number = Some(SerialNumber::from_slice(&serial));
    params.distinguished_name = distinguished_name;
    params.not_before = not_before;
    params.not_after = not_after;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    params.is_ca = IsCa::ExplicitNoCa;

    for host in request.host_entries() {
        let san = match host.parse::<IpAddr>() {
            Ok(ip) => SanType::IpAddress(ip),
            Err(_) => SanType::DnsName(Ia5String::try_from(host.to_string())?),
        };
        params.subject_alt_names.push(san);
    }

    if request.is_ca {
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages.push(KeyUsagePurpose::KeyCertSign);
    }

    let cert = params.self_signed(&key_pair)?;
    Ok(CredentialMaterial {
        private_key_pem: key_pair.serialize_pem(),
        certificate_pem: cert.pem(),
    })
}
