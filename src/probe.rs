// ===============================
// src/probe.rs (connectivity gate)
// ===============================
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Online means the well-known endpoint answered at all, whatever the status.
pub struct HttpProbe {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self { http: reqwest::Client::new(), url: url.to_string(), timeout }
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn is_online(&self) -> bool {
        match self.http.get(&self.url).timeout(self.timeout).send().await {
            Ok(_) => true,
            Err(e) => {
                debug!(?e, url = %self.url, "probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn any_answer_means_online() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)).mount(&server).await;
        assert!(HttpProbe::new(&server.uri(), Duration::from_secs(2)).is_online().await);
    }

    #[tokio::test]
    async fn silence_means_offline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;
        assert!(!HttpProbe::new(&server.uri(), Duration::from_millis(100)).is_online().await);
        assert!(!HttpProbe::new("http://127.0.0.1:9", Duration::from_secs(1)).is_online().await);
    }
}
