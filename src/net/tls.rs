//! Mutual TLS material for outbound passport lookups.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Problem with one of the PEM files.
#[derive(Debug, Error)]
#[error("{path:?}: {reason}")]
pub struct TlsMaterialError {
    pub path: PathBuf,
    pub reason: String,
}

impl TlsMaterialError {
    fn new(path: &Path, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Client identity plus the only root the client will trust.
pub struct ClientTlsMaterial {
    pub identity: reqwest::Identity,
    pub root: reqwest::Certificate,
}

impl std::fmt::Debug for ClientTlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientTlsMaterial").finish_non_exhaustive()
    }
}

/// Load CA certificate, client certificate and client key from PEM files.
///
/// Files are checked with `rustls-pemfile` first so a wrong path or an empty
/// file is reported against the file that caused it.
pub fn load_client_tls(
    ca_path: &Path,
    cert_path: &Path,
    key_path: &Path,
) -> Result<ClientTlsMaterial, TlsMaterialError> {
    let ca_pem = read_pem(ca_path)?;
    let cert_pem = read_pem(cert_path)?;
    let key_pem = read_pem(key_path)?;

    ensure_certificates(ca_path, &ca_pem)?;
    ensure_certificates(cert_path, &cert_pem)?;
    match rustls_pemfile::private_key(&mut key_pem.as_slice()) {
        Ok(Some(_)) => {}
        Ok(None) => return Err(TlsMaterialError::new(key_path, "no private key found")),
        Err(e) => return Err(TlsMaterialError::new(key_path, e.to_string())),
    }

    let root = reqwest::Certificate::from_pem(&ca_pem)
        .map_err(|e| TlsMaterialError::new(ca_path, e.to_string()))?;

    let mut identity_pem = cert_pem;
    identity_pem.push(b'\n');
    identity_pem.extend_from_slice(&key_pem);
    let identity = reqwest::Identity::from_pem(&identity_pem)
        .map_err(|e| TlsMaterialError::new(cert_path, e.to_string()))?;

    Ok(ClientTlsMaterial { identity, root })
}

fn read_pem(path: &Path) -> Result<Vec<u8>, TlsMaterialError> {
    std::fs::read(path).map_err(|e| TlsMaterialError::new(path, e.to_string()))
}

fn ensure_certificates(path: &Path, pem: &[u8]) -> Result<(), TlsMaterialError> {
    let mut count = 0;
    for cert in rustls_pemfile::certs(&mut &pem[..]) {
        cert.map_err(|e| TlsMaterialError::new(path, e.to_string()))?;
        count += 1;
    }
    if count == 0 {
        return Err(TlsMaterialError::new(path, "no certificates found"));
    }
    Ok(())
}
