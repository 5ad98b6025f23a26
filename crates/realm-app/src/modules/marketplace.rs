//! Listings, suggestions and the curated showcase.

use std::cmp::Reverse;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use realm_core::config::MarketplaceFilters;
use realm_core::Module;
use realm_services::{ListingForm, ServiceError};
use realm_types::{
    AppState, ListingId, MarketplaceListing, MarketplaceSuggestion, Rarity, RealmEvent, UserId,
    View,
};

use crate::context::AppContext;
use crate::modules::bind_view;
use crate::surface::{ListingCard, MarketplaceFrame, RenderFrame, ShowcaseCard, SortChoice};

/// Order in which listings are shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListingSort {
    /// Most recently listed first.
    #[default]
    Newest,
    /// Cheapest first.
    PriceAsc,
    /// Most expensive first.
    PriceDesc,
    /// Rarest first.
    Rarity,
}

impl ListingSort {
    /// Key used by the sort picker.
    pub const fn id(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "priceAsc",
            Self::PriceDesc => "priceDesc",
            Self::Rarity => "rarity",
        }
    }

    /// Parse a picker key.
    pub fn parse(id: &str) -> Option<Self> {
        [Self::Newest, Self::PriceAsc, Self::PriceDesc, Self::Rarity]
            .into_iter()
            .find(|sort| sort.id().eq_ignore_ascii_case(id.trim()))
    }

    fn apply(self, listings: &mut [&MarketplaceListing]) {
        match self {
            Self::Newest => listings.sort_by_key(|l| Reverse(l.created_at)),
            Self::PriceAsc => listings.sort_by_key(|l| (l.price_gold, l.price_gems)),
            Self::PriceDesc => listings.sort_by_key(|l| Reverse((l.price_gold, l.price_gems))),
            Self::Rarity => {
                listings.sort_by_key(|l| Reverse(l.collectible.as_ref().map(|c| c.rarity)));
            }
        }
    }
}

/// Sort and rarity applied to the listing grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingFilter {
    /// Display order.
    pub sort: ListingSort,
    /// Only this tier, or every tier.
    pub rarity: Option<Rarity>,
}

/// The marketplace view.
#[derive(Debug)]
pub struct MarketplaceModule {
    ctx: AppContext,
    filter: Arc<Mutex<ListingFilter>>,
}

impl MarketplaceModule {
    /// Subscribe to state and navigation.
    pub fn new(ctx: &AppContext) -> anyhow::Result<Self> {
        let filter: Arc<Mutex<ListingFilter>> = Arc::default();
        let shared = Arc::clone(&filter);
        bind_view(ctx, View::Marketplace, move |ctx, state| {
            draw(ctx, state, current(&shared));
        });
        Ok(Self {
            ctx: ctx.clone(),
            filter,
        })
    }

    /// Apply the sort named `id`.
    pub fn set_sort(&self, id: &str) -> Result<ListingSort, ServiceError> {
        let offered = self
            .ctx
            .config
            .marketplace
            .sort_options
            .iter()
            .any(|option| option.id.eq_ignore_ascii_case(id.trim()));
        let sort = ListingSort::parse(id)
            .filter(|_| offered)
            .ok_or_else(|| ServiceError::InvalidInput(format!("unknown sort `{}`", id.trim())))?;
        self.filter.lock().unwrap_or_else(PoisonError::into_inner).sort = sort;
        self.redraw();
        Ok(sort)
    }

    /// Filter by `rarity` (`None` for all) and redraw.
    pub fn filter_rarity(&self, rarity: Option<Rarity>) {
        self.filter.lock().unwrap_or_else(PoisonError::into_inner).rarity = rarity;
        self.redraw();
    }

    /// The filter currently applied.
    pub fn filter(&self) -> ListingFilter {
        current(&self.filter)
    }

    /// Buy `listing_id`, then ask for an economy refresh.
    pub async fn purchase(&self, listing_id: ListingId) -> Result<MarketplaceListing, ServiceError> {
        let user_id = self.ctx.require_user()?;
        let listing = self
            .ctx
            .services
            .marketplace
            .purchase_listing(listing_id, user_id)
            .await?;
        self.ctx.events.publish(&RealmEvent::EconomyRefresh);
        Ok(listing)
    }

    /// List one of the user's collectibles.
    pub async fn list(&self, form: &ListingForm) -> Result<MarketplaceListing, ServiceError> {
        let user_id = self.ctx.require_user()?;
        self.ctx.services.marketplace.create_listing(user_id, form).await
    }

    fn redraw(&self) {
        if self.ctx.is_active(View::Marketplace) {
            draw(&self.ctx, &self.ctx.store.state(), self.filter());
        }
    }
}

impl Module for MarketplaceModule {
    fn init(&self) -> Option<BoxFuture<'_, anyhow::Result<()>>> {
        Some(Box::pin(async move {
            self.redraw();
            Ok(())
        }))
    }
}

fn current(filter: &Mutex<ListingFilter>) -> ListingFilter {
    *filter.lock().unwrap_or_else(PoisonError::into_inner)
}

fn draw(ctx: &AppContext, state: &AppState, filter: ListingFilter) {
    let frame = marketplace_frame(state, &ctx.config.marketplace, filter);
    ctx.render(&RenderFrame::Marketplace(frame));
}

fn listing_card(listing: &MarketplaceListing, viewer: Option<UserId>) -> ListingCard {
    let summary = MarketplaceSuggestion::from_listing(listing);
    ListingCard {
        id: summary.id,
        title: summary.title,
        rarity: summary.rarity,
        price_gold: summary.price_gold,
        price_gems: summary.price_gems,
        seller: summary.seller,
        own: Some(listing.seller_id) == viewer,
    }
}

/// Build the marketplace view from `state`.
pub fn marketplace_frame(
    state: &AppState,
    options: &MarketplaceFilters,
    filter: ListingFilter,
) -> MarketplaceFrame {
    let viewer = state.user_id();
    let (gold, gems) = state
        .wallet
        .as_ref()
        .map_or((0, 0), |w| (w.gold_balance, w.gem_balance));

    let mut visible: Vec<&MarketplaceListing> = state
        .marketplace_listings
        .iter()
        .filter(|l| {
            filter
                .rarity
                .is_none_or(|rarity| l.collectible.as_ref().is_some_and(|c| c.rarity == rarity))
        })
        .collect();
    filter.sort.apply(&mut visible);

    MarketplaceFrame {
        gold,
        gems,
        listings: visible.into_iter().map(|l| listing_card(l, viewer)).collect(),
        suggestions: state
            .marketplace_suggestions
            .iter()
            .map(|s| ListingCard {
                id: s.id,
                title: s.title.clone(),
                rarity: s.rarity,
                price_gold: s.price_gold,
                price_gems: s.price_gems,
                seller: s.seller.clone(),
                own: false,
            })
            .collect(),
        showcase: state
            .marketplace_showcase
            .iter()
            .map(|entry| ShowcaseCard {
                headline: entry
                    .headline
                    .clone()
                    .unwrap_or_else(|| "Featured".to_owned()),
                title: entry
                    .collectible
                    .as_ref()
                    .map_or_else(|| "Collectible".to_owned(), |c| c.name.clone()),
                rarity: entry.collectible.as_ref().map(|c| c.rarity),
            })
            .collect(),
        rarities: options.rarities.clone(),
        rarity: filter.rarity,
        sort_options: options
            .sort_options
            .iter()
            .map(|option| SortChoice {
                id: option.id.clone(),
                label: option.label.clone(),
                selected: option.id == filter.sort.id(),
            })
            .collect(),
    }
}
