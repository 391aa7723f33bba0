use std::fs::File;
use std::io::{self, BufReader, ErrorKind};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use pgwire::tokio::tokio_rustls::rustls::ServerConfig;
use pgwire::tokio::TlsAcceptor;

/// Server settings, read from `ROOMBOOK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    /// `None` runs on the volatile in-memory store.
    pub data_dir: Option<PathBuf>,
    pub password: String,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5433,
            bind: "0.0.0.0".into(),
            data_dir: None,
            password: "roombook".into(),
            max_connections: 256,
            compact_threshold: 1000,
            tls_cert: None,
            tls_key: None,
            metrics_port: None,
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("ignoring unparsable {key}={raw:?}");
            None
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Missing or unparsable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        Self {
            port: parsed(&lookup, "ROOMBOOK_PORT").unwrap_or(d.port),
            bind: lookup("ROOMBOOK_BIND").unwrap_or(d.bind),
            data_dir: lookup("ROOMBOOK_DATA_DIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            password: lookup("ROOMBOOK_PASSWORD").unwrap_or(d.password),
            max_connections: parsed(&lookup, "ROOMBOOK_MAX_CONNECTIONS").unwrap_or(d.max_connections),
            compact_threshold: parsed(&lookup, "ROOMBOOK_COMPACT_THRESHOLD").unwrap_or(d.compact_threshold),
            tls_cert: lookup("ROOMBOOK_TLS_CERT"),
            tls_key: lookup("ROOMBOOK_TLS_KEY"),
            metrics_port: parsed(&lookup, "ROOMBOOK_METRICS_PORT"),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn tls_acceptor(&self) -> io::Result<Option<TlsAcceptor>> {
        load_tls_acceptor(self.tls_cert.as_deref(), self.tls_key.as_deref())
    }
}

pub fn load_tls_acceptor(
    cert_path: Option<&str>,
    key_path: Option<&str>,
) -> io::Result<Option<TlsAcceptor>> {
    let (cert_path, key_path) = match (cert_path, key_path) {
        (None, None) => return Ok(None),
        (Some(c), Some(k)) => (c, k),
        _ => {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "both ROOMBOOK_TLS_CERT and ROOMBOOK_TLS_KEY must be set, or neither",
            ));
        }
    };

    let certs: Vec<_> = rustls_pemfile::certs(&mut BufReader::new(File::open(cert_path)?))
        .collect::<Result<_, _>>()?;

    let key = rustls_pemfile::private_key(&mut BufReader::new(File::open(key_path)?))?
        .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "no private key found in key file"))?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e))?;

    config.alpn_protocols = vec![b"postgresql".to_vec()];

    Ok(Some(TlsAcceptor::from(Arc::new(config))))
}
