//! Player-to-player marketplace.

use chrono::Utc;
use realm_backend::Query;
use realm_types::{
    AppStatePatch, ListingId, ListingStatus, MarketplaceListing, MarketplaceSuggestion,
    RealmEvent, ShowcaseEntry, UserId,
};
use serde_json::json;
use validator::Validate;

use crate::context::ServiceContext;
use crate::economy::{EconomyService, PurchaseCost};
use crate::error::ServiceError;
use crate::forms::ListingForm;

const SCOPE: &str = "marketplace";
const LISTINGS: &str = "marketplace_listings";
const LISTING_SELECT: &str =
    "*, collectible:collectibles(*), seller:user_profiles!inner(username, flair_title)";
const CREATED_SELECT: &str =
    "*, collectible:collectibles(*), seller:user_profiles(username, flair_title)";

/// Suggestions shown next to the listings.
pub const MAX_SUGGESTIONS: usize = 6;

/// Active listings and the suggestions derived from them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketplaceSnapshot {
    /// Active listings, newest first.
    pub listings: Vec<MarketplaceListing>,
    /// Listings by other sellers.
    pub suggestions: Vec<MarketplaceSuggestion>,
}

/// Listing, buying and the curated showcase.
#[derive(Debug, Clone)]
pub struct MarketplaceService {
    ctx: ServiceContext,
    economy: EconomyService,
}

impl MarketplaceService {
    /// Create the service. Purchases are charged through `economy`.
    pub const fn new(ctx: ServiceContext, economy: EconomyService) -> Self {
        Self { ctx, economy }
    }

    /// Load active listings and derive suggestions for `user_id`.
    pub async fn load_marketplace(
        &self,
        user_id: Option<UserId>,
    ) -> Result<MarketplaceSnapshot, ServiceError> {
        if !self.ctx.config.features.marketplace {
            return Ok(MarketplaceSnapshot::default());
        }
        let query = Query::table(LISTINGS)
            .select(LISTING_SELECT)
            .eq("status", "active")
            .order("created_at", false);
        let listings: Vec<MarketplaceListing> = self
            .ctx
            .backend
            .select_as(&query)
            .await
            .map_err(|e| self.ctx.report(SCOPE, "load_marketplace", "Failed to load listings", e))?;
        self.ctx.store.patch(
            AppStatePatch::new().marketplace_listings(listings.clone()),
            "marketplace:listings",
        );

        let suggestions = suggestions_for(&listings, user_id);
        self.ctx.store.patch(
            AppStatePatch::new().marketplace_suggestions(suggestions.clone()),
            "marketplace:suggestions",
        );
        Ok(MarketplaceSnapshot {
            listings,
            suggestions,
        })
    }

    /// List a collectible for sale.
    pub async fn create_listing(
        &self,
        user_id: UserId,
        form: &ListingForm,
    ) -> Result<MarketplaceListing, ServiceError> {
        form.validate()?;
        let row = json!({
            "seller_id": user_id,
            "collectible_id": form.collectible_id,
            "price_gold": form.price_gold,
            "price_gems": form.price_gems,
            "status": ListingStatus::Active,
            "expires_at": form.expires_at,
        });
        let listing: MarketplaceListing = self
            .ctx
            .backend
            .insert_as(&Query::table(LISTINGS).select(CREATED_SELECT), row)
            .await
            .map_err(|e| self.ctx.report(SCOPE, "create_listing", "Failed to create listing", e))?;

        let created = listing.clone();
        self.ctx.store.update(
            move |state| {
                let existing = &state.marketplace_listings;
                let mut listings = Vec::with_capacity(existing.len().saturating_add(1));
                listings.push(created);
                listings.extend(existing.iter().cloned());
                AppStatePatch::new().marketplace_listings(listings)
            },
            "marketplace:created",
        );
        Ok(listing)
    }

    /// Buy `listing_id` for `buyer_id`.
    ///
    /// The buyer is charged before the listing is marked sold. A failure to
    /// log the transaction afterwards is reported but does not undo the
    /// purchase.
    pub async fn purchase_listing(
        &self,
        listing_id: ListingId,
        buyer_id: UserId,
    ) -> Result<MarketplaceListing, ServiceError> {
        let lookup = Query::table(LISTINGS).eq("id", listing_id);
        let listing: Option<MarketplaceListing> =
            self.ctx.backend.maybe_single_as(&lookup).await.map_err(|e| {
                self.ctx
                    .report(SCOPE, "load_listing_for_purchase", "Failed to load listing for purchase", e)
            })?;
        let Some(listing) = listing.filter(|l| l.status == ListingStatus::Active) else {
            tracing::warn!(scope = SCOPE, listing_id = %listing_id, "Listing no longer available");
            return Err(ServiceError::ListingUnavailable(listing_id));
        };

        self.economy
            .apply_marketplace_purchase(
                buyer_id,
                PurchaseCost {
                    gold: listing.price_gold,
                    gems: listing.price_gems,
                    listing_id,
                },
            )
            .await?;

        let now = Utc::now();
        self.ctx
            .backend
            .update(
                &lookup,
                json!({ "status": ListingStatus::Sold, "buyer_id": buyer_id, "sold_at": now }),
            )
            .await
            .map_err(|e| self.ctx.report(SCOPE, "complete_purchase", "Failed to complete purchase", e))?;

        let transaction = json!({
            "listing_id": listing_id,
            "buyer_id": buyer_id,
            "seller_id": listing.seller_id,
            "price_gold": listing.price_gold,
            "price_gems": listing.price_gems,
            "completed_at": now,
        });
        if let Err(e) = self
            .ctx
            .backend
            .insert(&Query::table("marketplace_transactions"), transaction)
            .await
        {
            self.ctx.report(
                SCOPE,
                "log_transaction",
                "Failed to log marketplace transaction",
                e,
            );
        }

        self.ctx.events.publish(&RealmEvent::MarketplacePurchased {
            listing_id,
            buyer_id,
        });
        self.load_marketplace(Some(buyer_id)).await?;
        Ok(listing)
    }

    /// Load the curated showcase, highest priority first.
    pub async fn load_curated_showcase(&self) -> Result<Vec<ShowcaseEntry>, ServiceError> {
        let query = Query::table("marketplace_showcase")
            .select("*, collectible:collectibles(*)")
            .order("priority", true);
        let showcase: Vec<ShowcaseEntry> = self
            .ctx
            .backend
            .select_as(&query)
            .await
            .map_err(|e| self.ctx.report(SCOPE, "load_curated_showcase", "Failed to load showcase", e))?;
        self.ctx.store.patch(
            AppStatePatch::new().marketplace_showcase(showcase.clone()),
            "marketplace:showcase",
        );
        Ok(showcase)
    }
}

/// Up to [`MAX_SUGGESTIONS`] listings not sold by `user_id`.
pub fn suggestions_for(
    listings: &[MarketplaceListing],
    user_id: Option<UserId>,
) -> Vec<MarketplaceSuggestion> {
    listings
        .iter()
        .filter(|listing| Some(listing.seller_id) != user_id)
        .take(MAX_SUGGESTIONS)
        .map(MarketplaceSuggestion::from_listing)
        .collect()
}
