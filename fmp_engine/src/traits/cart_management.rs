use crate::{
    db_types::{CartLine, ProductId, ResolvedCartLine},
    traits::MarketError,
};

#[allow(async_fn_in_trait)]
pub trait CartManagement {
    /// Adds `quantity` of the product to the buyer's cart. If the buyer already has a line for the product, the
    /// quantities are summed in a single statement.
    async fn upsert_cart_line(
        &self,
        buyer_id: &str,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<CartLine, MarketError>;

    /// Overwrites the quantity of a line owned by the buyer.
    async fn set_cart_line_quantity(&self, buyer_id: &str, line_id: i64, quantity: i64)
        -> Result<CartLine, MarketError>;

    /// Returns `true` if the line existed and was removed.
    async fn remove_cart_line(&self, buyer_id: &str, line_id: i64) -> Result<bool, MarketError>;

    /// The buyer's cart lines, joined with current catalog prices and stock.
    async fn fetch_cart_snapshot(&self, buyer_id: &str) -> Result<Vec<ResolvedCartLine>, MarketError>;

    /// Returns the number of lines removed.
    async fn clear_cart(&self, buyer_id: &str) -> Result<u64, MarketError>;
}
