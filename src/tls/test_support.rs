//! Self-signed node identity for tests
//!
//! One certificate for `localhost` and 127.0.0.1 that also acts as its own
//! CA. Shared by the unit tests and the integration tests under `tests/`.

use std::fs;
use std::path::{Path, PathBuf};

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509NameBuilder, X509};

use crate::common::Result;

/// Paths of a generated certificate, key and CA
#[derive(Debug, Clone)]
pub struct IdentityFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub ca: PathBuf,
}

/// Generate the identity and write it as PEM files into `dir`
pub fn self_signed(dir: &Path) -> Result<IdentityFiles> {
    let pkey = PKey::from_rsa(Rsa::generate(2048)?)?;

    let mut name = X509NameBuilder::new()?;
    name.append_entry_by_text("CN", "localhost")?;
    let name = name.build();

    let mut builder = X509::builder()?;
    builder.set_version(2)?;
    let serial = BigNum::from_u32(1)?.to_asn1_integer()?;
    builder.set_serial_number(&serial)?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_pubkey(&pkey)?;
    builder.set_not_before(&*Asn1Time::days_from_now(0)?)?;
    builder.set_not_after(&*Asn1Time::days_from_now(2)?)?;
    let san = SubjectAlternativeName::new()
        .dns("localhost")
        .ip("127.0.0.1")
        .build(&builder.x509v3_context(None, None))?;
    builder.append_extension(san)?;
    builder.sign(&pkey, MessageDigest::sha256())?;
    let cert = builder.build();

    let files = IdentityFiles {
        cert: dir.join("node.crt"),
        key: dir.join("node.key"),
        ca: dir.join("ca.crt"),
    };
    let pem = cert.to_pem()?;
    fs::write(&files.cert, &pem)?;
    fs::write(&files.ca, &pem)?;
    fs::write(&files.key, pkey.private_key_to_pem_pkcs8()?)?;
    Ok(files)
}
