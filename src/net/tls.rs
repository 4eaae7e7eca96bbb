//! TLS certificate loading for the optional HTTPS listener.

use std::io;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;

/// Load the PEM certificate chain and private key named by `tls`.
pub async fn load_tls_config(tls: &TlsConfig) -> Result<RustlsConfig, io::Error> {
    let cert_path = Path::new(&tls.cert_path);
    let key_path = Path::new(&tls.key_path);

    for (what, path) in [("Certificate", cert_path), ("Private key", key_path)] {
        if !path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} file not found: {:?}", what, path),
            ));
        }
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}
