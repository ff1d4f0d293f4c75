use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope wrapping every backend response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn into_result(self) -> Result<T, crate::error::ClientError> {
        use crate::error::ClientError;

        if !self.success {
            return Err(ClientError::Api(
                self.error
                    .unwrap_or_else(|| "request was not successful".to_string()),
            ));
        }
        self.data
            .ok_or_else(|| ClientError::Api("response carried no data".to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
    #[serde(rename = "subscriptionStats", default)]
    pub subscription_stats: Option<SubscriptionStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<Value>,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "subscriptionType")]
    pub subscription_type: Option<String>,
}

/// Subscription usage counters shown next to the current user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionStats {
    #[serde(default, alias = "subscriptionType")]
    pub subscription_type: Option<String>,
    #[serde(default, alias = "analysesUsed")]
    pub analyses_used: u64,
    #[serde(default, alias = "analysesLimit")]
    pub analyses_limit: Option<u64>,
    #[serde(default, alias = "daysRemaining")]
    pub days_remaining: Option<i64>,
}

/// One tracked product/SKU in a supply plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub article: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub current_stock: i64,
    #[serde(default)]
    pub reserved_stock: i64,
    #[serde(default)]
    pub available_stock: i64,
    #[serde(default)]
    pub daily_sales_rate: f64,
    #[serde(default)]
    pub forecast_units_30d: f64,
    #[serde(default)]
    pub forecast_revenue_30d: f64,
    #[serde(default)]
    pub turnover_days: Option<f64>,
    #[serde(default)]
    pub sales_7d: Option<f64>,
    #[serde(default)]
    pub sales_prev_7d: Option<f64>,
    #[serde(default)]
    pub recommended_supply: Option<f64>,
    #[serde(default)]
    pub days_until_oos: Option<f64>,
    #[serde(default)]
    pub stock_status: Option<String>,
}

impl StockRecord {
    /// Stock free for sale: current minus reserved, never below zero.
    pub fn available(&self) -> i64 {
        (self.current_stock - self.reserved_stock).max(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SupplyPlanRequest<'a> {
    pub articles: &'a [String],
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplyPlan {
    #[serde(default)]
    pub products: Vec<StockRecord>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductRequest<'a> {
    pub article: &'a str,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductAnalysis {
    pub article: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default, alias = "reviewsCount")]
    pub reviews_count: Option<u64>,
    #[serde(default)]
    pub sales: Option<f64>,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrandRequest<'a> {
    pub brand_name: &'a str,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandAnalysis {
    #[serde(alias = "brandName")]
    pub brand_name: String,
    #[serde(default, alias = "totalProducts")]
    pub total_products: Option<u64>,
    #[serde(default, alias = "totalRevenue")]
    pub total_revenue: Option<f64>,
    #[serde(default, alias = "averagePrice")]
    pub average_price: Option<f64>,
    #[serde(default, alias = "averageRating")]
    pub average_rating: Option<f64>,
    #[serde(default, alias = "topProducts")]
    pub top_products: Vec<RankedProduct>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A product entry inside a brand or category leaderboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankedProduct {
    #[serde(default)]
    pub article: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub sales: Option<f64>,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryRequest<'a> {
    pub category_name: &'a str,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryAnalysis {
    #[serde(default)]
    pub summary: Option<Value>,
    #[serde(default, rename = "top_15", alias = "topProducts")]
    pub top_products: Vec<RankedProduct>,
    #[serde(default)]
    pub pluses: Vec<String>,
    #[serde(default)]
    pub minuses: Vec<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Seller-entered campaign figures forwarded when the marketplace data is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualAdData {
    #[serde(default)]
    pub spend: Option<f64>,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub views: Option<u64>,
    #[serde(default)]
    pub clicks: Option<u64>,
    #[serde(default)]
    pub orders: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdMonitoringRequest<'a> {
    pub articles: &'a [String],
    #[serde(rename = "manualData", skip_serializing_if = "Option::is_none")]
    pub manual_data: Option<&'a std::collections::BTreeMap<String, ManualAdData>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdMonitoring {
    pub article: String,
    #[serde(default, alias = "campaignName")]
    pub campaign_name: Option<String>,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub orders: u64,
    #[serde(default)]
    pub spend: f64,
    #[serde(default)]
    pub revenue: f64,
    #[serde(default)]
    pub ctr: Option<f64>,
    #[serde(default)]
    pub roi: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleRequest {
    pub queries_count: u32,
    pub month: String,
    pub min_revenue: f64,
    pub min_frequency: u64,
    pub oracle_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleReport {
    #[serde(default)]
    pub main_results: Vec<OracleQuery>,
    #[serde(default)]
    pub detailed_results: Vec<Value>,
    #[serde(default)]
    pub summary: Option<Value>,
}

/// A ranked marketplace search term, consumed verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleQuery {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub frequency: Option<u64>,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub competition: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
