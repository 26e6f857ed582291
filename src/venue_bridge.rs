// ===============================
// src/venue_bridge.rs
// ===============================
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};
use url::Url;

use crate::bridge::{
    encode_params, sign_query, timestamp_ms, ErrorBody, LoginRequest, LoginResponse, WireAccount, WireDeal,
    WirePosition,
};
use crate::domain::{AccountInfo, Credentials, Deal, OpenPosition, Ticket};
use crate::venue::{VenueClient, VenueError, VenueResult};

/// Trading terminal reached through an HTTP bridge process.
/// Every call is signed: `timestamp`, `recvWindow`, `signature` + `X-BRIDGE-APIKEY`.
pub struct BridgeVenue {
    http: reqwest::Client,
    base: Url,
    api_key: String,
    api_secret: String,
    recv_window: u64,
    last_error: Mutex<String>,
}

impl BridgeVenue {
    pub fn new(base: &str, api_key: &str, api_secret: &str, timeout: Duration) -> VenueResult<Self> {
        let base = Url::parse(base).map_err(|e| VenueError::Transport(format!("bad bridge url {base}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VenueError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base,
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            recv_window: 5000,
            last_error: Mutex::new(String::new()),
        })
    }

    fn remember(&self, e: &VenueError) {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = e.to_string();
        }
    }

    fn signed_url(&self, endpoint: &str, mut params: Vec<(&str, String)>) -> VenueResult<Url> {
        params.push(("timestamp", timestamp_ms().to_string()));
        params.push(("recvWindow", self.recv_window.to_string()));
        let query = encode_params(&params);
        let sig = sign_query(&self.api_secret, &query);
        let mut url = self
            .base
            .join(endpoint)
            .map_err(|e| VenueError::Transport(format!("bad endpoint {endpoint}: {e}")))?;
        url.set_query(Some(&format!("{query}&signature={sig}")));
        Ok(url)
    }

    async fn read<T: DeserializeOwned>(&self, rsp: reqwest::Response) -> VenueResult<Option<T>> {
        let code = rsp.status();
        if code == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if code == StatusCode::UNAUTHORIZED || code == StatusCode::FORBIDDEN {
            return Err(VenueError::NotAuthenticated);
        }
        let body = rsp.text().await.map_err(|e| VenueError::Transport(e.to_string()))?;
        if !code.is_success() {
            let err = serde_json::from_str::<ErrorBody>(&body)
                .unwrap_or(ErrorBody { code: code.as_u16() as i64, message: body });
            return Err(VenueError::Venue { code: err.code, message: err.message });
        }
        serde_json::from_str::<Option<T>>(&body).map_err(|e| VenueError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, params: Vec<(&str, String)>) -> VenueResult<Option<T>> {
        let url = self.signed_url(endpoint, params)?;
        debug!(%url, "bridge GET");
        let rsp = self
            .http
            .get(url)
            .header("X-BRIDGE-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| VenueError::Transport(e.to_string()))?;
        self.read(rsp).await
    }

    fn tracked<T>(&self, res: VenueResult<T>) -> VenueResult<T> {
        if let Err(e) = &res {
            self.remember(e);
        }
        res
    }
}

#[async_trait]
impl VenueClient for BridgeVenue {
    fn name(&self) -> &str {
        "bridge"
    }

    async fn authenticate(&self, creds: &Credentials) -> bool {
        let url = match self.signed_url("api/v1/login", Vec::new()) {
            Ok(u) => u,
            Err(e) => {
                self.remember(&e);
                return false;
            }
        };
        let body = LoginRequest { login: creds.login, password: &creds.password, server: &creds.server };
        let resp = self.http.post(url).header("X-BRIDGE-APIKEY", &self.api_key).json(&body).send().await;

        let res = match resp {
            Ok(rsp) => self.read::<LoginResponse>(rsp).await,
            Err(e) => Err(VenueError::Transport(e.to_string())),
        };
        match res {
            Ok(Some(LoginResponse { ok: true, .. })) => {
                info!(login = creds.login, server = %creds.server, "bridge login ok");
                true
            }
            Ok(Some(LoginResponse { error, .. })) => {
                let e = VenueError::Venue { code: -1, message: error.unwrap_or_else(|| "login refused".into()) };
                error!(%e, "bridge login failed");
                self.remember(&e);
                false
            }
            Ok(None) => {
                self.remember(&VenueError::Decode("empty login answer".into()));
                false
            }
            Err(e) => {
                error!(%e, "bridge login failed");
                self.remember(&e);
                false
            }
        }
    }

    async fn list_open_positions(&self) -> VenueResult<Vec<OpenPosition>> {
        // an empty array is the only way to say "nothing open"; a null or 404
        // listing would otherwise look like every position closed
        let res = match self.get::<Vec<WirePosition>>("api/v1/positions", Vec::new()).await {
            Ok(Some(wire)) => Ok(wire.into_iter().map(OpenPosition::from).collect()),
            Ok(None) => Err(VenueError::Decode("null position listing".into())),
            Err(e) => Err(e),
        };
        self.tracked(res)
    }

    async fn fetch_deal_history(&self, ticket: Ticket) -> VenueResult<Option<Vec<Deal>>> {
        let res = match self
            .get::<Vec<WireDeal>>("api/v1/history/deals", vec![("position", ticket.to_string())])
            .await
        {
            Ok(Some(wire)) => Ok(Some(wire.into_iter().map(Deal::from).collect())),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        self.tracked(res)
    }

    async fn fetch_account_metadata(&self) -> VenueResult<Option<AccountInfo>> {
        let res = self
            .get::<WireAccount>("api/v1/account", Vec::new())
            .await
            .map(|a| a.map(AccountInfo::from));
        self.tracked(res)
    }

    fn last_error_description(&self) -> String {
        self.last_error.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DealEntry;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn venue(server: &MockServer) -> BridgeVenue {
        BridgeVenue::new(&server.uri(), "key", "secret", Duration::from_secs(5)).expect("bridge")
    }

    #[tokio::test]
    async fn lists_positions_with_signed_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/positions"))
            .and(header("X-BRIDGE-APIKEY", "key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"ticket": 1001, "symbol": "EURUSD", "volume": 0.1, "price_open": 1.1, "type": 0},
                {"ticket": 1002, "symbol": "GBPUSD", "volume": 0.2, "price_open": 1.25, "type": 4}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let v = venue(&server);
        let positions = v.list_open_positions().await.expect("positions");
        assert_eq!(positions.iter().map(|p| p.ticket).collect::<Vec<_>>(), vec![1001, 1002]);

        let reqs = server.received_requests().await.unwrap_or_default();
        let query = reqs[0].url.query().unwrap_or_default().to_string();
        let (unsigned, sig) = query.rsplit_once("&signature=").expect("signature present");
        assert_eq!(sig, sign_query("secret", unsigned));
        assert!(unsigned.contains("timestamp="));
    }

    #[tokio::test]
    async fn history_for_position() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/history/deals"))
            .and(query_param("position", "77"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"ticket": 1, "position_id": 77, "time": 100, "price": 1.2, "volume": 0.1, "profit": 0.0, "symbol": "EURUSD", "entry": 0},
                {"ticket": 2, "position_id": 77, "time": 200, "price": 1.19, "volume": 0.1, "profit": -100.0, "symbol": "EURUSD", "entry": 1}
            ])))
            .mount(&server)
            .await;

        let deals = venue(&server).fetch_deal_history(77).await.expect("ok").expect("some");
        assert_eq!(deals.len(), 2);
        assert_eq!(deals[1].entry, DealEntry::Closing);
    }

    #[tokio::test]
    async fn missing_history_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/history/deals"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        assert!(venue(&server).fetch_deal_history(5).await.expect("ok").is_none());

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/history/deals"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;
        assert!(venue(&server).fetch_deal_history(5).await.expect("ok").is_none());
    }

    #[tokio::test]
    async fn empty_array_is_the_only_empty_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/positions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;
        assert!(venue(&server).list_open_positions().await.expect("ok").is_empty());

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/positions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;
        let v = venue(&server);
        assert!(matches!(v.list_open_positions().await, Err(VenueError::Decode(_))));
        assert!(v.last_error_description().contains("null position listing"));

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/positions"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        assert!(venue(&server).list_open_positions().await.is_err());
    }

    #[tokio::test]
    async fn venue_errors_are_remembered() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/positions"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(serde_json::json!({"code": -10004, "message": "No connection"})),
            )
            .mount(&server)
            .await;

        let v = venue(&server);
        match v.list_open_positions().await {
            Err(VenueError::Venue { code, message }) => {
                assert_eq!(code, -10004);
                assert_eq!(message, "No connection");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(v.last_error_description().contains("No connection"));
    }

    #[tokio::test]
    async fn login_and_account() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/account"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "login": 42, "currency": "USD", "balance": 1000.0, "equity": 990.5, "server": "Demo"
            })))
            .mount(&server)
            .await;

        let v = venue(&server);
        let creds = Credentials { login: 42, password: "pw".into(), server: "Demo".into() };
        assert!(v.authenticate(&creds).await);
        let acct = v.fetch_account_metadata().await.expect("ok").expect("some");
        assert_eq!(acct.currency, "USD");
        assert_eq!(acct.login, 42);
    }

    #[tokio::test]
    async fn refused_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/login"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let v = venue(&server);
        let creds = Credentials { login: 1, password: "bad".into(), server: "Demo".into() };
        assert!(!v.authenticate(&creds).await);
        assert_eq!(v.last_error_description(), "not authenticated");
    }
}
