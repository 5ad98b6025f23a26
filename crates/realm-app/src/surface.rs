//! The rendering seam between view modules and whatever draws them.
//!
//! Modules never produce markup. They build a [`RenderFrame`], a typed
//! view model of one [`Region`], and hand it to a [`Surface`]. The browser
//! build draws frames with its templates; [`LogSurface`] writes them
//! through `tracing` and [`RecordingSurface`] keeps them for tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use realm_types::{
    AcquisitionId, CodeId, ListingId, QuestId, Rarity, Theme, UserQuest, View,
};
use serde::Serialize;

/// Placeholder shown in the main region while signed out.
pub const SIGNED_OUT_MESSAGE: &str = "Sign in to begin your journey.";

/// A drawable area of the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    /// The view container every view module draws into.
    Main,
    /// Footer with the year and app version.
    Footer,
}

impl core::fmt::Display for Region {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Main => "main",
            Self::Footer => "footer",
        })
    }
}

/// Something frames can be drawn on.
pub trait Surface: Send + Sync {
    /// Replace the content of `region` with `frame`.
    fn render(&self, region: Region, frame: &RenderFrame);

    /// Apply the colour theme.
    fn set_theme(&self, theme: Theme);

    /// Update the connection indicator.
    fn set_status_pill(&self, label: &str, connected: bool);
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// Typed view model of a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum RenderFrame {
    /// Placeholder while no one is signed in.
    SignedOut {
        /// Text shown.
        message: String,
    },
    /// Footer content.
    Footer(FooterFrame),
    /// The dashboard view.
    Dashboard(DashboardFrame),
    /// The collection view.
    Collection(CollectionFrame),
    /// The redeem form.
    Redeem(RedeemFrame),
    /// The marketplace view.
    Marketplace(MarketplaceFrame),
    /// The quest log.
    Quests(QuestLogFrame),
    /// The admin console.
    Admin(AdminFrame),
}

impl RenderFrame {
    /// The view this frame belongs to, for view frames.
    pub const fn view(&self) -> Option<View> {
        match self {
            Self::SignedOut { .. } | Self::Footer(_) => None,
            Self::Dashboard(_) => Some(View::Dashboard),
            Self::Collection(_) => Some(View::Collection),
            Self::Redeem(_) => Some(View::Redeem),
            Self::Marketplace(_) => Some(View::Marketplace),
            Self::Quests(_) => Some(View::Quests),
            Self::Admin(_) => Some(View::Admin),
        }
    }

    /// Short name used in logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SignedOut { .. } => "signed_out",
            Self::Footer(_) => "footer",
            Self::Dashboard(_) => "dashboard",
            Self::Collection(_) => "collection",
            Self::Redeem(_) => "redeem",
            Self::Marketplace(_) => "marketplace",
            Self::Quests(_) => "quests",
            Self::Admin(_) => "admin",
        }
    }
}

/// Footer content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FooterFrame {
    /// Current year.
    pub year: i32,
    /// App version.
    pub version: String,
}

/// A quest with its progress bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestCard {
    /// Assignment id.
    pub id: QuestId,
    /// Title.
    pub title: String,
    /// Objective text.
    pub description: String,
    /// Progress so far.
    pub progress: i64,
    /// Progress needed.
    pub target: i64,
    /// Whole percent, `0..=100`.
    pub percent: u8,
    /// Gold reward.
    pub reward_gold: i64,
    /// Gem reward.
    pub reward_gems: i64,
    /// Whether the quest is done.
    pub completed: bool,
}

impl QuestCard {
    /// Card for `quest`.
    pub fn from_quest(quest: &UserQuest) -> Self {
        let definition = quest.quest.as_ref();
        Self {
            id: quest.id,
            title: definition.map_or_else(|| "Quest".to_owned(), |d| d.title.clone()),
            description: definition
                .and_then(|d| d.description.clone())
                .unwrap_or_default(),
            progress: quest.progress,
            target: definition.map_or(0, |d| d.target_amount),
            percent: quest.percent_complete(),
            reward_gold: definition.and_then(|d| d.reward_gold).unwrap_or(0),
            reward_gems: definition.and_then(|d| d.reward_gems).unwrap_or(0),
            completed: quest.is_completed(),
        }
    }
}

/// An earned achievement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AchievementCard {
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Icon.
    pub icon: String,
}

/// A seasonal event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonalCard {
    /// Event name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Start.
    pub starts_at: DateTime<Utc>,
    /// End, if scheduled.
    pub ends_at: Option<DateTime<Utc>>,
}

/// The dashboard view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardFrame {
    /// Heading copy.
    pub welcome_title: String,
    /// Subheading copy.
    pub welcome_subtitle: String,
    /// Profile username, or "Adventurer".
    pub display_name: String,
    /// Gold balance.
    pub gold: i64,
    /// Gem balance.
    pub gems: i64,
    /// Number of collectibles held.
    pub collection_power: usize,
    /// Number of quests not yet completed.
    pub quest_momentum: usize,
    /// Active quests.
    pub quests: Vec<QuestCard>,
    /// Earned achievements.
    pub achievements: Vec<AchievementCard>,
    /// Seasonal spotlights.
    pub seasonal: Vec<SeasonalCard>,
}

/// Number of collectibles of one rarity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RarityGroup {
    /// Tier.
    pub rarity: Rarity,
    /// Title-cased tier.
    pub label: String,
    /// Collectibles held in this tier.
    pub count: usize,
}

/// One collectible in the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectibleCard {
    /// The copy, used to convert it.
    pub acquisition_id: AcquisitionId,
    /// Name.
    pub name: String,
    /// Tier.
    pub rarity: Rarity,
    /// Title-cased tier.
    pub rarity_label: String,
    /// Lore, or a placeholder.
    pub lore: String,
}

/// The collection view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionFrame {
    /// Collectibles held in total.
    pub total: usize,
    /// Tiers present in the collection, rarest last.
    pub groups: Vec<RarityGroup>,
    /// Active search text.
    pub search: String,
    /// Active rarity filter.
    pub rarity: Option<Rarity>,
    /// Collectibles passing the filters.
    pub cards: Vec<CollectibleCard>,
}

/// Inline result of a redeem attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum RedeemFeedback {
    /// No one is signed in.
    SignedOut,
    /// The code was redeemed.
    Success(String),
    /// Redemption failed.
    Failure(String),
}

impl RedeemFeedback {
    /// Text shown under the form.
    pub fn message(&self) -> &str {
        match self {
            Self::SignedOut => "You must be signed in to redeem codes.",
            Self::Success(message) | Self::Failure(message) => message,
        }
    }
}

/// The redeem form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedeemFrame {
    /// Result of the last attempt.
    pub feedback: Option<RedeemFeedback>,
}

/// A listing in the marketplace grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingCard {
    /// Listing id.
    pub id: ListingId,
    /// Collectible name.
    pub title: String,
    /// Collectible tier.
    pub rarity: Option<Rarity>,
    /// Gold price.
    pub price_gold: i64,
    /// Gem price.
    pub price_gems: i64,
    /// Seller name.
    pub seller: String,
    /// Whether the viewer is the seller.
    pub own: bool,
}

/// A curated showcase entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShowcaseCard {
    /// Headline.
    pub headline: String,
    /// Featured collectible.
    pub title: String,
    /// Featured tier.
    pub rarity: Option<Rarity>,
}

/// A selectable sort order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortChoice {
    /// Key.
    pub id: String,
    /// Label.
    pub label: String,
    /// Whether it is applied.
    pub selected: bool,
}

/// The marketplace view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketplaceFrame {
    /// Viewer's gold.
    pub gold: i64,
    /// Viewer's gems.
    pub gems: i64,
    /// Listings passing the filter, in the selected order.
    pub listings: Vec<ListingCard>,
    /// Suggested listings.
    pub suggestions: Vec<ListingCard>,
    /// Curated showcase.
    pub showcase: Vec<ShowcaseCard>,
    /// Rarity filter options.
    pub rarities: Vec<Rarity>,
    /// Active rarity filter.
    pub rarity: Option<Rarity>,
    /// Sort options.
    pub sort_options: Vec<SortChoice>,
}

/// The quest log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestLogFrame {
    /// Active quests.
    pub quests: Vec<QuestCard>,
}

/// A redemption code in the admin list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeRow {
    /// Code id.
    pub id: CodeId,
    /// The code.
    pub code: String,
    /// Tier granted.
    pub rarity: Option<Rarity>,
    /// `count/cap`, or `count/∞`.
    pub redemptions: String,
    /// Expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Gold granted.
    pub reward_gold: i64,
    /// Gems granted.
    pub reward_gems: i64,
    /// Whether the code is live.
    pub active: bool,
}

/// The admin console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminFrame {
    /// Every code, newest first.
    pub codes: Vec<CodeRow>,
    /// Tiers offered by the form.
    pub rarities: Vec<Rarity>,
    /// Result of the last form submission.
    pub notice: Option<String>,
}

// ---------------------------------------------------------------------------
// Surfaces
// ---------------------------------------------------------------------------

/// Writes every frame through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSurface;

impl Surface for LogSurface {
    fn render(&self, region: Region, frame: &RenderFrame) {
        match serde_json::to_string(frame) {
            Ok(body) => tracing::debug!(scope = "surface", %region, frame = frame.kind(), %body, "Rendered"),
            Err(error) => tracing::warn!(scope = "surface", %region, error = %error, "Frame not serializable"),
        }
    }

    fn set_theme(&self, theme: Theme) {
        tracing::debug!(scope = "surface", theme = theme.as_str(), "Theme applied");
    }

    fn set_status_pill(&self, label: &str, connected: bool) {
        tracing::debug!(scope = "surface", label, connected, "Status pill updated");
    }
}

#[derive(Debug, Default)]
struct Recorded {
    frames: Vec<(Region, RenderFrame)>,
    theme: Option<Theme>,
    status: Option<(String, bool)>,
}

/// Keeps everything it is asked to draw.
///
/// Cloning yields another handle to the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingSurface {
    /// An empty recording.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every frame drawn, oldest first.
    pub fn frames(&self) -> Vec<(Region, RenderFrame)> {
        self.lock().frames.clone()
    }

    /// The frame currently shown in `region`.
    pub fn last(&self, region: Region) -> Option<RenderFrame> {
        self.lock()
            .frames
            .iter()
            .rev()
            .find(|(drawn, _)| *drawn == region)
            .map(|(_, frame)| frame.clone())
    }

    /// Number of frames drawn for `view`.
    pub fn count(&self, view: View) -> usize {
        self.lock()
            .frames
            .iter()
            .filter(|(_, frame)| frame.view() == Some(view))
            .count()
    }

    /// Theme last applied.
    pub fn theme(&self) -> Option<Theme> {
        self.lock().theme
    }

    /// Status pill label and state last shown.
    pub fn status_pill(&self) -> Option<(String, bool)> {
        self.lock().status.clone()
    }

    /// Forget the recorded frames.
    pub fn clear(&self) {
        self.lock().frames.clear();
    }
}

impl Surface for RecordingSurface {
    fn render(&self, region: Region, frame: &RenderFrame) {
        self.lock().frames.push((region, frame.clone()));
    }

    fn set_theme(&self, theme: Theme) {
        self.lock().theme = Some(theme);
    }

    fn set_status_pill(&self, label: &str, connected: bool) {
        self.lock().status = Some((label.to_owned(), connected));
    }
}
