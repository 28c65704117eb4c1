use crate::{
    db_types::{NewProduct, Product, ProductId},
    traits::MarketError,
};

/// Read and write access to the product catalog. The catalog itself is owned by the wider marketplace; the engine
/// needs it to price cart lines and to check farmer ownership of order items.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, MarketError>;

    async fn fetch_product(&self, product_id: &ProductId) -> Result<Option<Product>, MarketError>;

    async fn products_for_farmer(&self, farmer_id: &str) -> Result<Vec<Product>, MarketError>;

    /// Removes a product from the catalog. Cart lines that refer to it are dropped with it. Orders keep their copy of
    /// the product name and price, so order history is unaffected.
    ///
    /// Returns `true` if a product was removed.
    async fn delete_product(&self, product_id: &ProductId) -> Result<bool, MarketError>;
}
