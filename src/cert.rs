//! Throwaway certificates for TLS and mutual TLS ingress tests.

use std::{
    fs,
    net::IpAddr,
    path::{Path, PathBuf},
};

use rcgen::{
    string::Ia5String, BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue,
    ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair, KeyUsagePurpose, SanType,
};

use crate::{HarnessError, Result};

const ORGANIZATION: &str = "example Inc.";
const CA_VALIDITY_DAYS: i64 = 365;
const LEAF_VALIDITY_DAYS: i64 = 365;

/// A generated certificate together with its private key, both PEM encoded.
#[derive(Clone, Debug)]
pub struct CertBuilder {
    cert_pem: String,
    key_pem: String,
}

/// Paths written by [`CertBuilder::write_files`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CertFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl CertBuilder {
    /// Creates a self-signed CA.
    pub fn new_ca(common_name: &str) -> Result<Self> {
        let mut params = base_params(common_name, CA_VALIDITY_DAYS);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        let key = generate_key()?;
        let cert = params
            .self_signed(&key)
            .map_err(|e| HarnessError::Cert(format!("failed to create CA certificate: {e}")))?;

        Ok(Self {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
        })
    }

    /// Creates a server certificate signed by `ca`.
    ///
    /// Each entry of `sans` becomes an IP address SAN when it parses as one,
    /// and a DNS name SAN otherwise. The first entry is also the common name.
    pub fn new_server_cert(ca: &CertBuilder, sans: &[&str]) -> Result<Self> {
        let common_name = sans.first().copied().unwrap_or("example.com");
        let mut params = base_params(common_name, LEAF_VALIDITY_DAYS);
        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        params.subject_alt_names = sans
            .iter()
            .map(|san| subject_alt_name(san))
            .collect::<Result<Vec<_>>>()?;

        ca.sign(params)
    }

    /// Creates a client certificate signed by `ca`.
    pub fn new_client_cert(ca: &CertBuilder, common_name: &str) -> Result<Self> {
        let mut params = base_params(common_name, LEAF_VALIDITY_DAYS);
        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];

        ca.sign(params)
    }

    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    pub fn private_key_pem(&self) -> &str {
        &self.key_pem
    }

    /// Writes `<name>.crt` and `<name>.key` into `dir`, creating it if needed.
    pub fn write_files(&self, dir: impl AsRef<Path>, name: &str) -> Result<CertFiles> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let files = CertFiles {
            cert: dir.join(format!("{name}.crt")),
            key: dir.join(format!("{name}.key")),
        };
        fs::write(&files.cert, &self.cert_pem)?;
        fs::write(&files.key, &self.key_pem)?;
        Ok(files)
    }

    fn sign(&self, params: CertificateParams) -> Result<Self> {
        let ca_key = KeyPair::from_pem(&self.key_pem)
            .map_err(|e| HarnessError::Cert(format!("failed to load CA key: {e}")))?;
        let issuer = Issuer::from_ca_cert_pem(&self.cert_pem, &ca_key)
            .map_err(|e| HarnessError::Cert(format!("failed to create issuer: {e}")))?;

        let key = generate_key()?;
        let cert = params
            .signed_by(&key, &issuer)
            .map_err(|e| HarnessError::Cert(format!("failed to sign certificate: {e}")))?;

        Ok(Self {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
        })
    }
}

fn base_params(common_name: &str, validity_days: i64) -> CertificateParams {
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, DnValue::Utf8String(common_name.to_owned()));
    dn.push(
        DnType::OrganizationName,
        DnValue::Utf8String(ORGANIZATION.to_owned()),
    );
    params.distinguished_name = dn;

    let now = time::OffsetDateTime::now_utc();
    params.not_before = now;
    params.not_after = now + time::Duration::days(validity_days);
    params
}

fn generate_key() -> Result<KeyPair> {
    KeyPair::generate().map_err(|e| HarnessError::Cert(format!("failed to generate key: {e}")))
}

fn subject_alt_name(san: &str) -> Result<SanType> {
    if let Ok(ip) = san.parse::<IpAddr>() {
        return Ok(SanType::IpAddress(ip));
    }
    Ia5String::try_from(san.to_owned())
        .map(SanType::DnsName)
        .map_err(|e| HarnessError::Cert(format!("invalid DNS name '{san}': {e}")))
}
