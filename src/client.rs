//! REST client for the analytics backend.
//!
//! Every call carries the session's bearer token and unwraps the
//! `{success, data, error}` envelope. A 401 clears the session and surfaces
//! as [`ClientError::SessionExpired`]; nothing is retried automatically.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::{Client as ReqwestClient, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::error::ClientError;
use crate::models::{
    AdMonitoring, AdMonitoringRequest, ApiResponse, BrandAnalysis, BrandRequest,
    CategoryAnalysis, CategoryRequest, LoginRequest, LoginResponse, ManualAdData, OracleReport,
    OracleRequest, ProductAnalysis, ProductRequest, SupplyPlan, SupplyPlanRequest,
};
use crate::session::SessionProvider;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";
const LOGIN_PATH: &str = "/auth/login";

pub struct ApiClient {
    http: ReqwestClient,
    base_url: String,
    session: Arc<dyn SessionProvider>,
}

impl ApiClient {
    pub fn new(
        config: &ApiConfig,
        session: Arc<dyn SessionProvider>,
    ) -> Result<Self, ClientError> {
        let http = ReqwestClient::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    /// Send one request and return the backend envelope.
    #[instrument(skip_all, fields(method = %method, path = %path))]
    pub async fn request<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let request_id = Uuid::new_v4();

        let mut builder = self
            .http
            .request(method.clone(), &url)
            .header(REQUEST_ID_HEADER, request_id.to_string());
        if let Some(token) = self.session.token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        debug!(%request_id, %url, "sending request");
        let response = builder.send().await?;
        let status = response.status();
        debug!(%request_id, %status, "received response");

        if status == StatusCode::UNAUTHORIZED && path == LOGIN_PATH {
            warn!(%request_id, "backend rejected the login credentials");
            return Err(ClientError::InvalidCredentials);
        }
        if status == StatusCode::UNAUTHORIZED {
            warn!(%request_id, "backend rejected the session token, clearing session");
            self.session.invalidate();
            return Err(ClientError::SessionExpired);
        }

        let bytes = response.bytes().await?;
        if !status.is_success() {
            // Backends often still send the envelope with an error message.
            if let Ok(envelope) = serde_json::from_slice::<ApiResponse<serde_json::Value>>(&bytes) {
                if let Some(message) = envelope.error {
                    return Err(ClientError::Api(message));
                }
            }
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let data = self
            .request::<B, T>(Method::POST, path, Some(body))
            .await?
            .into_result()?;
        info!(path, "request successful");
        Ok(data)
    }

    /// Authenticate and store the issued token in the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let email = required("email", email)?;
        if password.is_empty() {
            return Err(ClientError::Validation("password is required".to_string()));
        }

        let response: LoginResponse = self
            .post(LOGIN_PATH, &LoginRequest { email, password })
            .await?;
        self.session.store(&response.token)?;
        Ok(response)
    }

    pub fn logout(&self) {
        self.session.invalidate();
    }

    pub async fn analyze_product(&self, article: &str) -> Result<ProductAnalysis, ClientError> {
        let article = required("article", article)?;
        self.post("/analysis/product", &ProductRequest { article }).await
    }

    pub async fn analyze_brand(&self, brand_name: &str) -> Result<BrandAnalysis, ClientError> {
        let brand_name = required("brand name", brand_name)?;
        self.post("/analysis/brand", &BrandRequest { brand_name }).await
    }

    pub async fn analyze_category(
        &self,
        category_name: &str,
    ) -> Result<CategoryAnalysis, ClientError> {
        let category_name = required("category name", category_name)?;
        self.post("/analysis/category", &CategoryRequest { category_name })
            .await
    }

    pub async fn supply_planning(&self, articles: &[String]) -> Result<SupplyPlan, ClientError> {
        required_articles(articles)?;
        self.post("/planning/supply-planning", &SupplyPlanRequest { articles })
            .await
    }

    pub async fn ad_monitoring(
        &self,
        articles: &[String],
        manual_data: Option<&BTreeMap<String, ManualAdData>>,
    ) -> Result<Vec<AdMonitoring>, ClientError> {
        required_articles(articles)?;
        let manual_data = manual_data.filter(|data| !data.is_empty());
        self.post(
            "/planning/ad-monitoring",
            &AdMonitoringRequest {
                articles,
                manual_data,
            },
        )
        .await
    }

    pub async fn oracle_enhanced(
        &self,
        request: &OracleRequest,
    ) -> Result<OracleReport, ClientError> {
        if request.queries_count == 0 {
            return Err(ClientError::Validation(
                "queries count must be at least 1".to_string(),
            ));
        }
        required("month", &request.month)?;
        required("oracle type", &request.oracle_type)?;
        if !(request.min_revenue.is_finite() && request.min_revenue >= 0.0) {
            return Err(ClientError::Validation(
                "minimum revenue must be non-negative".to_string(),
            ));
        }
        self.post("/analysis/oracle-enhanced", request).await
    }
}

fn required<'a>(name: &str, value: &'a str) -> Result<&'a str, ClientError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ClientError::Validation(format!("{name} is required")));
    }
    Ok(trimmed)
}

fn required_articles(articles: &[String]) -> Result<(), ClientError> {
    if articles.is_empty() {
        return Err(ClientError::Validation(
            "at least one article is required".to_string(),
        ));
    }
    if articles.iter().any(|article| article.trim().is_empty()) {
        return Err(ClientError::Validation(
            "articles must not be blank".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::session::MemorySession;

    fn client_for(server: &MockServer, session: Arc<MemorySession>) -> ApiClient {
        let config = ApiConfig {
            base_url: format!("{}/api/", server.uri()),
            timeout_secs: 5,
            ..ApiConfig::default()
        };
        ApiClient::new(&config, session).expect("api client")
    }

    #[tokio::test]
    async fn supply_planning_sends_bearer_token_and_unwraps_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/planning/supply-planning"))
            .and(header("authorization", "Bearer secret-token"))
            .and(header_exists("x-request-id"))
            .and(body_json(json!({"articles": ["111", "222"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "products": [
                        {"article": "111", "current_stock": 5, "daily_sales_rate": 2.0},
                        {"article": "222", "current_stock": 0, "daily_sales_rate": 0.0}
                    ],
                    "summary": "2 products analysed"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = Arc::new(MemorySession::with_token("secret-token"));
        let client = client_for(&server, session);
        let plan = client
            .supply_planning(&["111".to_string(), "222".to_string()])
            .await
            .expect("supply plan");

        assert_eq!(plan.products.len(), 2);
        assert_eq!(plan.products[0].current_stock, 5);
        assert_eq!(plan.summary, "2 products analysed");
    }

    #[tokio::test]
    async fn unauthorized_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let session = Arc::new(MemorySession::with_token("stale"));
        let client = client_for(&server, session.clone());
        let err = client.analyze_product("123").await.unwrap_err();

        assert!(matches!(err, ClientError::SessionExpired));
        assert_eq!(session.token(), None);
    }

    #[tokio::test]
    async fn unsuccessful_envelope_becomes_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/analysis/brand"))
            .and(body_json(json!({"brand_name": "Acme"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error": "Brand not found"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemorySession::new()));
        let err = client.analyze_brand("  Acme ").await.unwrap_err();

        assert_eq!(err.to_string(), "backend error: Brand not found");
    }

    #[tokio::test]
    async fn server_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemorySession::new()));
        let err = client.analyze_category("Mugs").await.unwrap_err();

        match err {
            ClientError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn login_stores_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({"email": "seller@example.com", "password": "hunter2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "token": "fresh-token",
                    "user": {"id": 7, "email": "seller@example.com", "name": "Seller"},
                    "subscriptionStats": {"analysesUsed": 3, "analysesLimit": 100}
                }
            })))
            .mount(&server)
            .await;

        let session = Arc::new(MemorySession::new());
        let client = client_for(&server, session.clone());
        let login = client
            .login("seller@example.com", "hunter2")
            .await
            .expect("login");

        assert_eq!(login.user.email, "seller@example.com");
        assert_eq!(login.subscription_stats.unwrap().analyses_used, 3);
        assert_eq!(session.token().as_deref(), Some("fresh-token"));
    }

    #[tokio::test]
    async fn rejected_login_keeps_existing_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let session = Arc::new(MemorySession::with_token("still-valid"));
        let client = client_for(&server, session.clone());
        let err = client.login("seller@example.com", "wrong").await.unwrap_err();

        assert!(matches!(err, ClientError::InvalidCredentials));
        assert_eq!(session.token().as_deref(), Some("still-valid"));
    }

    #[tokio::test]
    async fn validation_happens_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemorySession::new()));

        assert!(matches!(
            client.analyze_product("   ").await,
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            client.supply_planning(&[]).await,
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            client.login("", "pw").await,
            Err(ClientError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn ad_monitoring_forwards_manual_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/planning/ad-monitoring"))
            .and(body_json(json!({
                "articles": ["111"],
                "manualData": {"111": {"spend": 1000.0, "revenue": 2500.0,
                    "views": null, "clicks": null, "orders": null}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": [{"article": "111", "views": 1000, "clicks": 40,
                          "spend": 1000.0, "revenue": 2500.0}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manual = BTreeMap::from([(
            "111".to_string(),
            ManualAdData {
                spend: Some(1000.0),
                revenue: Some(2500.0),
                ..ManualAdData::default()
            },
        )]);
        let client = client_for(&server, Arc::new(MemorySession::new()));
        let ads = client
            .ad_monitoring(&["111".to_string()], Some(&manual))
            .await
            .expect("ads");

        assert_eq!(ads.len(), 1);
        assert_eq!(ads[0].clicks, 40);
    }

    #[tokio::test]
    async fn oracle_request_uses_backend_field_names() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/analysis/oracle-enhanced"))
            .and(body_json(json!({
                "queries_count": 5,
                "month": "2026-09",
                "min_revenue": 100000.0,
                "min_frequency": 500,
                "oracle_type": "products"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "main_results": [{"query": "ceramic mug", "rank": 1, "frequency": 9000}],
                    "detailed_results": [],
                    "summary": {"total_queries": 1}
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(MemorySession::new()));
        let report = client
            .oracle_enhanced(&OracleRequest {
                queries_count: 5,
                month: "2026-09".to_string(),
                min_revenue: 100_000.0,
                min_frequency: 500,
                oracle_type: "products".to_string(),
            })
            .await
            .expect("oracle");

        assert_eq!(report.main_results[0].query, "ceramic mug");
    }
}
