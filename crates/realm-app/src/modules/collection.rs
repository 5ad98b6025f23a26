//! The user's collection, grouped by rarity and filterable.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use realm_core::Module;
use realm_services::ServiceError;
use realm_types::{
    events, AcquisitionId, AppState, OwnedCollectible, Rarity, RealmEvent, View, Wallet,
};

use crate::context::AppContext;
use crate::modules::bind_view;
use crate::surface::{CollectibleCard, CollectionFrame, RarityGroup, RenderFrame};

const LORE_PLACEHOLDER: &str = "Hidden lore awaits discovery.";

/// Search text and rarity currently applied to the grid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionFilter {
    /// Case-insensitive text matched against name and lore.
    pub search: String,
    /// Only this tier, or every tier.
    pub rarity: Option<Rarity>,
}

impl CollectionFilter {
    /// Whether `item` passes the filter.
    pub fn matches(&self, item: &OwnedCollectible) -> bool {
        let needle = self.search.trim().to_lowercase();
        let text = needle.is_empty()
            || item.name.to_lowercase().contains(&needle)
            || item
                .lore
                .as_deref()
                .is_some_and(|lore| lore.to_lowercase().contains(&needle));
        text && self.rarity.is_none_or(|rarity| item.rarity == rarity)
    }
}

/// Collection browser.
#[derive(Debug)]
pub struct CollectionModule {
    ctx: AppContext,
    filter: Arc<Mutex<CollectionFilter>>,
}

impl CollectionModule {
    /// Subscribe to state, navigation and redemptions.
    pub fn new(ctx: &AppContext) -> anyhow::Result<Self> {
        let filter: Arc<Mutex<CollectionFilter>> = Arc::default();

        let shared = Arc::clone(&filter);
        bind_view(ctx, View::Collection, move |ctx, state| {
            draw(ctx, state, &current(&shared));
        });

        let on_redeem = ctx.clone();
        let shared = Arc::clone(&filter);
        ctx.events.on(events::REDEEM_COMPLETED, move |_| {
            if on_redeem.is_active(View::Collection) {
                draw(&on_redeem, &on_redeem.store.state(), &current(&shared));
            }
            Ok(())
        });

        Ok(Self {
            ctx: ctx.clone(),
            filter,
        })
    }

    /// Filter by `text` and redraw.
    pub fn search(&self, text: &str) {
        self.filter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .search = text.to_owned();
        self.redraw();
    }

    /// Filter by `rarity` (`None` for all) and redraw.
    pub fn filter_rarity(&self, rarity: Option<Rarity>) {
        self.filter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .rarity = rarity;
        self.redraw();
    }

    /// The filter currently applied.
    pub fn filter(&self) -> CollectionFilter {
        current(&self.filter)
    }

    /// Convert the copy `acquisition_id` into currency.
    ///
    /// Returns `None` when the copy is not in the collection.
    pub async fn convert_duplicate(
        &self,
        acquisition_id: AcquisitionId,
    ) -> Result<Option<Wallet>, ServiceError> {
        let rarity = self
            .ctx
            .store
            .state()
            .collectibles
            .iter()
            .find(|item| item.acquisition_id == acquisition_id)
            .map(|item| item.rarity);
        let Some(rarity) = rarity else {
            return Ok(None);
        };
        let user_id = self.ctx.require_user()?;
        let wallet = self
            .ctx
            .services
            .economy
            .convert_duplicate(user_id, rarity)
            .await?;
        self.ctx.events.publish(&RealmEvent::EconomyRefresh);
        Ok(Some(wallet))
    }

    fn redraw(&self) {
        if self.ctx.is_active(View::Collection) {
            draw(&self.ctx, &self.ctx.store.state(), &self.filter());
        }
    }
}

impl Module for CollectionModule {
    fn init(&self) -> Option<BoxFuture<'_, anyhow::Result<()>>> {
        Some(Box::pin(async move {
            self.redraw();
            Ok(())
        }))
    }
}

fn current(filter: &Mutex<CollectionFilter>) -> CollectionFilter {
    filter.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

fn draw(ctx: &AppContext, state: &AppState, filter: &CollectionFilter) {
    ctx.render(&RenderFrame::Collection(collection_frame(state, filter)));
}

/// Build the collection view from `state`.
pub fn collection_frame(state: &AppState, filter: &CollectionFilter) -> CollectionFrame {
    let items = &state.collectibles;
    let groups = Rarity::ALL
        .into_iter()
        .filter_map(|rarity| {
            let count = items.iter().filter(|item| item.rarity == rarity).count();
            (count > 0).then(|| RarityGroup {
                rarity,
                label: rarity.label().to_owned(),
                count,
            })
        })
        .collect();
    CollectionFrame {
        total: items.len(),
        groups,
        search: filter.search.clone(),
        rarity: filter.rarity,
        cards: items
            .iter()
            .filter(|item| filter.matches(item))
            .map(|item| CollectibleCard {
                acquisition_id: item.acquisition_id,
                name: item.name.clone(),
                rarity: item.rarity,
                rarity_label: item.rarity_label.clone(),
                lore: item
                    .lore
                    .clone()
                    .unwrap_or_else(|| LORE_PLACEHOLDER.to_owned()),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use realm_types::{AppStatePatch, CollectibleId};

    use super::*;

    fn item(name: &str, rarity: Rarity, lore: Option<&str>) -> OwnedCollectible {
        OwnedCollectible {
            id: CollectibleId::new(),
            name: name.into(),
            rarity,
            lore: lore.map(Into::into),
            image_url: None,
            acquisition_id: AcquisitionId::new(),
            acquired_at: Utc::now(),
            rarity_label: rarity.label().into(),
        }
    }

    fn state() -> AppState {
        AppState::initial(true, Utc::now()).merged(AppStatePatch::new().collectibles(vec![
            item("Ember Fox", Rarity::Rare, Some("Born of the first hearth")),
            item("Tide Lantern", Rarity::Common, None),
            item("Moth Queen", Rarity::Rare, Some("Drawn to EMBERS")),
        ]))
    }

    #[test]
    fn search_matches_name_or_lore_case_insensitively() {
        let filter = CollectionFilter {
            search: "ember".into(),
            rarity: None,
        };
        let frame = collection_frame(&state(), &filter);
        let names: Vec<&str> = frame.cards.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Ember Fox", "Moth Queen"]);
        assert_eq!(frame.total, 3);
    }

    #[test]
    fn rarity_filter_and_groups() {
        let filter = CollectionFilter {
            search: String::new(),
            rarity: Some(Rarity::Common),
        };
        let frame = collection_frame(&state(), &filter);
        assert_eq!(frame.cards.len(), 1);
        assert_eq!(frame.cards.first().map(|c| c.lore.as_str()), Some(LORE_PLACEHOLDER));
        let groups: Vec<(Rarity, usize)> = frame.groups.iter().map(|g| (g.rarity, g.count)).collect();
        assert_eq!(groups, [(Rarity::Common, 1), (Rarity::Rare, 2)]);
    }
}
