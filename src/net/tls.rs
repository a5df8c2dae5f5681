//! TLS configuration and certificate loading.

use std::path::Path;
use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;

fn require_file(path: &Path, what: &str) -> Result<(), std::io::Error> {
    if path.is_file() {
        Ok(())
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found: {}", what, path.display()),
        ))
    }
}

/// Load the rustls server configuration from PEM certificate and key files.
pub async fn load_tls_config(tls: &TlsConfig) -> Result<RustlsConfig, std::io::Error> {
    require_file(&tls.cert_path, "Certificate file")?;
    require_file(&tls.key_path, "Private key file")?;

    RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await
}
