//! Product summary record.

use serde::{Deserialize, Serialize};

use crate::types::id::ProductId;
use crate::types::price::Price;

/// The last-known-good slice of a product.
///
/// This is the shape the offline subsystem snapshots from live catalog
/// traffic: enough to render a listing tile and a minimal detail page, and
/// nothing that goes stale faster than the snapshot itself (no inventory
/// counts, no variant matrices).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    /// Upstream product identifier.
    pub id: ProductId,
    /// URL handle, e.g. `driftwood-candle` for `/products/driftwood-candle`.
    pub handle: String,
    /// Display title.
    pub title: String,
    /// Current price at snapshot time.
    pub price: Price,
}

impl ProductSummary {
    /// Whether `needle` identifies this product by handle or raw ID.
    ///
    /// Detail routes carry either form depending on which surface linked to
    /// them, so membership checks accept both.
    #[must_use]
    pub fn matches_identifier(&self, needle: &str) -> bool {
        self.handle == needle || self.id.as_str() == needle
    }
}
