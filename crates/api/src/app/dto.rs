use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tenure_catalog::{Page, PageRequest, Product};
use tenure_subscriptions::{Subscription, SubscriptionStatus};

// -------------------------
// Envelope
// -------------------------

/// Every response body: `{ "data": ..., "meta": ..., "error": ... }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
}

impl<T> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            data: Some(data),
            meta: None,
            error: None,
        }
    }

    pub fn page(data: T, meta: PageMeta) -> Self {
        Self {
            data: Some(data),
            meta: Some(meta),
            error: None,
        }
    }
}

impl Envelope<()> {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self {
            data: None,
            meta: None,
            error: Some(ErrorBody {
                message: message.into(),
                code: code.to_string(),
            }),
        }
    }
}

// -------------------------
// Request DTOs
// -------------------------

/// Raw pagination query. Unparseable values fall back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ListProductsQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListProductsQuery {
    pub fn to_request(&self) -> PageRequest {
        let parse = |raw: &Option<String>| raw.as_deref().and_then(|s| s.trim().parse::<i64>().ok());
        PageRequest::normalized(parse(&self.page), parse(&self.limit))
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Net price in minor currency units.
    pub price: u64,
    pub tax_rate_bps: u32,
    pub total_price: u64,
    pub duration_days: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id.to_string(),
            total_price: p.total_price(),
            duration_days: p.duration.days(),
            name: p.name,
            description: p.description,
            price: p.price,
            tax_rate_bps: p.tax_rate_bps,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

pub fn product_page(page: Page<Product>) -> Envelope<Vec<ProductResponse>> {
    let meta = PageMeta {
        total: page.total,
        page: page.page,
        limit: page.limit,
    };
    Envelope::page(page.items.into_iter().map(ProductResponse::from).collect(), meta)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(s: Subscription) -> Self {
        Self {
            id: s.id.to_string(),
            user_id: s.user_id.to_string(),
            product_id: s.product_id.to_string(),
            status: s.status,
            start_date: s.start_date,
            end_date: s.end_date,
            paused_at: s.paused_at,
            cancelled_at: s.cancelled_at,
            version: s.version.get(),
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}
