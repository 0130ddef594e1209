//! # Cart Service
//!
//! The entry point the web layer talks to. Every call is one store
//! transaction that ends with a totals recompute, wrapped in bounded retry.
//!
//! ## Request Flow
//! ```text
//! ┌──────────────┐     ┌─────────────┐     ┌──────────────────────────────┐
//! │  Web layer   │────►│ CartService │────►│ RetryPolicy::run             │
//! │ (identity,   │     │  validate   │     │   └─ CartStore::             │
//! │  cart calls) │◄────│  inputs     │◄────│        run_in_transaction    │
//! └──────────────┘     └─────────────┘     │          ├─ mutate lines     │
//!                                          │          └─ CartPricer::     │
//!                                          │               refresh        │
//!                                          └──────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use basket_cart::{CartConfig, CartService};
//! use basket_core::{FulfillmentType, OwnerKey};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let service = CartService::open(&CartConfig::load()?).await?;
//! let owner = OwnerKey::session("c0ffee");
//!
//! let priced = service
//!     .add_item(&owner, "PAINT-5L-WHT", FulfillmentType::ForDelivery, 2)
//!     .await?;
//! println!("{}", priced.cart.totals.total_price_with_vat);
//! # Ok(())
//! # }
//! ```

use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::CartConfig;
use crate::error::{CartError, CartResult};
use crate::identity::{IdentityResolver, RequestIdentity, SessionOrUserResolver};
use crate::lookup::PriceLookup;
use crate::merge::{CartMergeEngine, MergeOutcome};
use crate::pricer::{CartPricer, PricedCart};
use crate::retry::RetryPolicy;
use crate::store::{CartStore, CartTransaction, SqliteCartStore};
use basket_core::validation::{ensure_line_capacity, validate_inventory_ref, validate_quantity};
use basket_core::{FulfillmentType, OwnerKey, PricingConfig};
use basket_db::Database;

/// Cart operations over a [`CartStore`].
pub struct CartService<S: CartStore> {
    store: Arc<S>,
    pricer: CartPricer,
    merger: CartMergeEngine<S>,
    retry: RetryPolicy,
    resolver: Arc<dyn IdentityResolver>,
}

impl<S: CartStore> std::fmt::Debug for CartService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartService")
            .field("pricer", &self.pricer)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl CartService<SqliteCartStore> {
    /// Opens the configured database and prices from its inventory table.
    pub async fn open(config: &CartConfig) -> CartResult<Self> {
        let db = Database::new(config.db_config()).await?;
        let lookup = Arc::new(db.inventory());

        info!(path = %config.database_path, "Cart service ready");

        Ok(CartService::new(
            Arc::new(SqliteCartStore::new(db)),
            lookup,
            config.pricing(),
            config.retry_policy(),
        ))
    }
}

impl<S: CartStore> CartService<S> {
    pub fn new(
        store: Arc<S>,
        lookup: Arc<dyn PriceLookup>,
        pricing: PricingConfig,
        retry: RetryPolicy,
    ) -> Self {
        let pricer = CartPricer::new(lookup, pricing);
        let merger = CartMergeEngine::new(Arc::clone(&store), pricer.clone());

        CartService {
            store,
            pricer,
            merger,
            retry,
            resolver: Arc::new(SessionOrUserResolver),
        }
    }

    /// Replaces the default [`SessionOrUserResolver`].
    pub fn with_resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current cart of `owner` with freshly computed totals.
    ///
    /// Does not create a cart.
    pub async fn get_cart(&self, owner: &OwnerKey) -> CartResult<Option<PricedCart>> {
        let owner = owner.clone();
        let pricer = self.pricer.clone();

        self.transact("get_cart", move |tx| {
            Box::pin(async move {
                match tx.find_by_owner(&owner).await? {
                    Some(cart) => pricer.refresh(tx, &cart.id, &owner).await.map(Some),
                    None => Ok(None),
                }
            })
        })
        .await
    }

    /// [`get_cart`](Self::get_cart) for whoever `request` resolves to.
    pub async fn resolve_and_get(
        &self,
        request: &RequestIdentity,
    ) -> CartResult<Option<PricedCart>> {
        let owner = self.resolver.resolve(request)?;
        self.get_cart(&owner).await
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Folds the session's cart into the user's cart after sign-in.
    ///
    /// Safe to call more than once for the same login.
    pub async fn on_authenticated(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> CartResult<MergeOutcome> {
        let session = OwnerKey::from_parts(Some(session_id), None)?;
        let user = OwnerKey::from_parts(None, Some(user_id))?;

        self.retry
            .run("merge", || self.merger.merge(&session, &user))
            .await
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds `quantity` units, creating the cart on first use.
    pub async fn add_item(
        &self,
        owner: &OwnerKey,
        inventory_ref: &str,
        fulfillment_type: FulfillmentType,
        quantity: u32,
    ) -> CartResult<PricedCart> {
        let inventory_ref = validate_inventory_ref(inventory_ref)?.to_string();
        validate_quantity(quantity)?;

        let owner = owner.clone();
        let pricer = self.pricer.clone();

        self.transact("add_item", move |tx| {
            Box::pin(async move {
                let cart = match tx.find_by_owner(&owner).await? {
                    Some(cart) => cart,
                    None => {
                        let cart = tx.create_cart(&owner).await?;
                        debug!(cart_id = %cart.id, owner = %owner, "Cart created on first add");
                        cart
                    }
                };

                match cart.find_item(&inventory_ref, fulfillment_type) {
                    Some(line) => validate_quantity(line.quantity.saturating_add(quantity))?,
                    None => ensure_line_capacity(cart.items.len())?,
                }

                tx.upsert_item(
                    &cart.id,
                    &inventory_ref,
                    fulfillment_type,
                    i64::from(quantity),
                )
                .await?;

                pricer.refresh(tx, &cart.id, &owner).await
            })
        })
        .await
    }

    /// Sets a line to exactly `quantity` units; zero removes it.
    pub async fn set_quantity(
        &self,
        owner: &OwnerKey,
        inventory_ref: &str,
        fulfillment_type: FulfillmentType,
        quantity: u32,
    ) -> CartResult<PricedCart> {
        let inventory_ref = validate_inventory_ref(inventory_ref)?.to_string();
        if quantity != 0 {
            validate_quantity(quantity)?;
        }

        let owner = owner.clone();
        let pricer = self.pricer.clone();

        self.transact("set_quantity", move |tx| {
            Box::pin(async move {
                let cart = tx
                    .find_by_owner(&owner)
                    .await?
                    .ok_or_else(|| CartError::not_found(owner.to_string()))?;

                let current = match cart.find_item(&inventory_ref, fulfillment_type) {
                    Some(line) => line.quantity,
                    None if quantity > 0 => {
                        ensure_line_capacity(cart.items.len())?;
                        0
                    }
                    None => 0,
                };

                let delta = i64::from(quantity) - i64::from(current);
                if delta != 0 {
                    tx.upsert_item(&cart.id, &inventory_ref, fulfillment_type, delta)
                        .await?;
                }

                pricer.refresh(tx, &cart.id, &owner).await
            })
        })
        .await
    }

    /// Removes a line. A missing line leaves the cart unchanged.
    pub async fn remove_item(
        &self,
        owner: &OwnerKey,
        inventory_ref: &str,
        fulfillment_type: FulfillmentType,
    ) -> CartResult<PricedCart> {
        self.set_quantity(owner, inventory_ref, fulfillment_type, 0)
            .await
    }

    /// Deletes the owner's cart. Returns `false` if there was none.
    pub async fn clear_cart(&self, owner: &OwnerKey) -> CartResult<bool> {
        let owner = owner.clone();

        self.transact("clear_cart", move |tx| {
            Box::pin(async move {
                match tx.find_by_owner(&owner).await? {
                    Some(cart) => {
                        tx.delete_cart(&cart.id).await?;
                        debug!(cart_id = %cart.id, "Cart cleared");
                        Ok(true)
                    }
                    None => Ok(false),
                }
            })
        })
        .await
    }

    /// Runs `work` in a transaction, re-running it from scratch on
    /// transient failures.
    async fn transact<T, F>(&self, operation: &str, work: F) -> CartResult<T>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, CartResult<T>>
            + Clone
            + Send
            + 'static,
    {
        self.retry
            .run(operation, || self.store.run_in_transaction(work.clone()))
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
