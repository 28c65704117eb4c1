use std::fmt::Debug;

use fmp_common::Cents;
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Actor, CartLine, ProductId, ResolvedCartLine, Role},
    fmp_api::inventory_api::validate_quantity,
    traits::{CartManagement, MarketError},
};

/// A buyer's cart, priced at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub buyer_id: String,
    pub lines: Vec<ResolvedCartLine>,
}

impl CartSnapshot {
    /// The priced total of the cart, or `None` if it is too large to represent.
    pub fn total(&self) -> Option<Cents> {
        Cents::checked_sum(self.lines.iter().map(ResolvedCartLine::line_total).collect::<Option<Vec<_>>>()?)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// `CartApi` maintains each buyer's pending selections. Only a customer can touch their own cart.
pub struct CartApi<B> {
    db: B,
}

impl<B> Debug for CartApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CartApi")
    }
}

impl<B> CartApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> CartApi<B>
where B: CartManagement
{
    /// Adds `quantity` of a product to the actor's cart. Adding a product that is already in the cart increases the
    /// quantity of the existing line.
    pub async fn add_line(&self, actor: &Actor, product_id: &ProductId, quantity: i64) -> Result<CartLine, MarketError> {
        let buyer_id = buyer(actor)?;
        validate_quantity(quantity)?;
        let line = self.db.upsert_cart_line(buyer_id, product_id, quantity).await?;
        debug!("🛒️ {quantity} x {product_id} added to the cart of {buyer_id}");
        Ok(line)
    }

    /// Replaces the quantity of a cart line. Setting the quantity to zero removes the line, in which case `None` is
    /// returned.
    pub async fn set_quantity(
        &self,
        actor: &Actor,
        line_id: i64,
        quantity: i64,
    ) -> Result<Option<CartLine>, MarketError> {
        if quantity == 0 {
            return self.remove_line(actor, line_id).await.map(|_| None);
        }
        let buyer_id = buyer(actor)?;
        validate_quantity(quantity)?;
        self.db.set_cart_line_quantity(buyer_id, line_id, quantity).await.map(Some)
    }

    pub async fn remove_line(&self, actor: &Actor, line_id: i64) -> Result<(), MarketError> {
        let buyer_id = buyer(actor)?;
        if self.db.remove_cart_line(buyer_id, line_id).await? {
            debug!("🛒️ Line {line_id} removed from the cart of {buyer_id}");
            Ok(())
        } else {
            Err(MarketError::CartLineNotFound(line_id))
        }
    }

    pub async fn snapshot(&self, actor: &Actor) -> Result<CartSnapshot, MarketError> {
        let buyer_id = buyer(actor)?;
        self.snapshot_for(buyer_id).await
    }

    pub(crate) async fn snapshot_for(&self, buyer_id: &str) -> Result<CartSnapshot, MarketError> {
        let lines = self.db.fetch_cart_snapshot(buyer_id).await?;
        Ok(CartSnapshot { buyer_id: buyer_id.to_string(), lines })
    }

    pub async fn clear(&self, actor: &Actor) -> Result<u64, MarketError> {
        let buyer_id = buyer(actor)?;
        let n = self.db.clear_cart(buyer_id).await?;
        debug!("🛒️ Cleared {n} line(s) from the cart of {buyer_id}");
        Ok(n)
    }
}

fn buyer(actor: &Actor) -> Result<&str, MarketError> {
    match actor.role {
        Role::Customer => Ok(actor.subject_id.as_str()),
        _ => Err(MarketError::PermissionDenied(format!("{actor} does not have a cart"))),
    }
}
