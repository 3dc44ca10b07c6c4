//! Récupération synchrone des enregistrements
//!
//! Le transport HTTP est asynchrone (reqwest) mais l'appel est bloquant :
//! chaque requête est pilotée jusqu'à son terme par un runtime tokio
//! mono-thread détenu par le transport.

use std::time::Duration;

use serde_json::Value;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

use crate::types::RawRecord;
use crate::StrideError;

/// Timeout par défaut d'une requête (secondes)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Réponse HTTP brute
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Transport HTTP (injectable pour les tests)
pub trait HttpTransport {
    /// Effectue un GET ; `Err` porte le texte de l'erreur de transport
    fn get(&self, url: &str) -> Result<HttpResponse, String>;
}

/// Configuration du client HTTP
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,

    /// Utiliser les proxys définis dans l'environnement (HTTP_PROXY, ...)
    pub use_env_proxy: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: crate::query::DEFAULT_BASE_URL.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: concat!("stride/", env!("CARGO_PKG_VERSION")).into(),
            use_env_proxy: true,
        }
    }
}

impl FetchConfig {
    /// Charge la configuration depuis les variables d'environnement
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("STRIDE_BASE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("STRIDE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            user_agent: std::env::var("STRIDE_USER_AGENT").unwrap_or(defaults.user_agent),
            use_env_proxy: std::env::var("STRIDE_NO_PROXY").is_err(),
        }
    }
}

/// Transport réel : client reqwest asynchrone + runtime tokio bloquant
pub struct ReqwestTransport {
    client: reqwest::Client,
    runtime: Runtime,
}

impl ReqwestTransport {
    pub fn new(config: &FetchConfig) -> Result<Self, StrideError> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone());
        if !config.use_env_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| StrideError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StrideError::Network(format!("Failed to start I/O runtime: {}", e)))?;

        Ok(Self { client, runtime })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, String> {
        // La réponse (et sa connexion) est libérée en sortie du bloc, quel que soit le chemin
        self.runtime.block_on(async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| error_chain(&e))?;
            let status = response.status().as_u16();
            let body = response.bytes().await.map_err(|e| error_chain(&e))?;
            Ok::<_, String>(HttpResponse {
                status,
                body: body.to_vec(),
            })
        })
    }
}

/// Message d'erreur incluant les causes sous-jacentes
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Résultat d'une récupération réussie
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Au moins un enregistrement
    Records(Vec<RawRecord>),
    /// Réponse vide ou qui n'est pas une liste : pas une erreur
    NoData,
}

impl FetchOutcome {
    pub fn len(&self) -> usize {
        match self {
            FetchOutcome::Records(records) => records.len(),
            FetchOutcome::NoData => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Effectue l'unique GET et classe les échecs
pub struct HttpFetcher<T: HttpTransport> {
    transport: T,
}

impl<T: HttpTransport> HttpFetcher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn fetch(&self, url: &str) -> Result<FetchOutcome, StrideError> {
        info!(url = %url, "Requesting data");

        let response = self.transport.get(url).map_err(StrideError::Network)?;
        if response.status != 200 {
            return Err(StrideError::HttpStatus(response.status));
        }
        debug!(bytes = response.body.len(), "Response received");

        let data: Value = serde_json::from_slice(&response.body)
            .map_err(|e| StrideError::ResponseParse(e.to_string()))?;

        Ok(into_outcome(data))
    }
}

fn into_outcome(data: Value) -> FetchOutcome {
    let items = match data {
        Value::Array(items) if !items.is_empty() => items,
        _ => return FetchOutcome::NoData,
    };

    let total = items.len();
    let records: Vec<RawRecord> = items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| match item {
            Value::Object(map) => Some(map),
            other => {
                warn!(index = i, value = %other, "Skipping non-object item in response");
                None
            }
        })
        .collect();

    if records.is_empty() {
        warn!(items = total, "Response list contained no records");
        return FetchOutcome::NoData;
    }
    FetchOutcome::Records(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Transport simulé renvoyant une réponse fixe
    pub struct MockTransport {
        pub response: Result<HttpResponse, String>,
        pub calls: Cell<usize>,
    }

    impl MockTransport {
        pub fn ok(status: u16, body: &str) -> Self {
            Self {
                response: Ok(HttpResponse {
                    status,
                    body: body.as_bytes().to_vec(),
                }),
                calls: Cell::new(0),
            }
        }
    }

    impl HttpTransport for MockTransport {
        fn get(&self, _url: &str) -> Result<HttpResponse, String> {
            self.calls.set(self.calls.get() + 1);
            self.response.clone()
        }
    }

    #[test]
    fn test_records() {
        let fetcher = HttpFetcher::new(MockTransport::ok(200, r#"[{"id": 1}, {"id": 2}]"#));
        let outcome = fetcher.fetch("http://x").unwrap();
        assert_eq!(outcome.len(), 2);
        assert_eq!(fetcher.transport.calls.get(), 1);
    }

    #[test]
    fn test_http_status() {
        let fetcher = HttpFetcher::new(MockTransport::ok(503, "Service Unavailable"));
        let err = fetcher.fetch("http://x").unwrap_err();
        assert!(matches!(err, StrideError::HttpStatus(503)));
    }

    #[test]
    fn test_network_error() {
        let fetcher = HttpFetcher::new(MockTransport {
            response: Err("dns error: no such host".into()),
            calls: Cell::new(0),
        });
        let err = fetcher.fetch("http://x").unwrap_err();
        match err {
            StrideError::Network(msg) => assert!(msg.contains("no such host")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_error() {
        let fetcher = HttpFetcher::new(MockTransport::ok(200, "<html>oops</html>"));
        let err = fetcher.fetch("http://x").unwrap_err();
        assert!(matches!(err, StrideError::ResponseParse(_)));
    }

    #[test]
    fn test_no_data() {
        for body in ["[]", "{}", r#"{"detail": "nothing"}"#, "null", "42", "[1, 2]"] {
            let fetcher = HttpFetcher::new(MockTransport::ok(200, body));
            assert_eq!(fetcher.fetch("http://x").unwrap(), FetchOutcome::NoData, "{}", body);
        }
    }

    #[test]
    fn test_non_object_items_skipped() {
        let fetcher = HttpFetcher::new(MockTransport::ok(200, r#"[{"id": 1}, "junk", null]"#));
        match fetcher.fetch("http://x").unwrap() {
            FetchOutcome::Records(records) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0]["id"], 1);
            }
            FetchOutcome::NoData => panic!("expected records"),
        }
    }

    #[test]
    fn test_default_config() {
        let config = FetchConfig::default();
        assert_eq!(config.base_url, crate::query::DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(config.user_agent.starts_with("stride/"));
    }
}
