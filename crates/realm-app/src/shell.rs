//! Line-oriented commands driving the view modules.
//!
//! [`Command::parse`] turns one typed line into a gesture and [`execute`]
//! runs it against a bootstrapped [`App`]. Gesture failures come back as
//! text so the prompt keeps going; only shell-level failures are errors.

use std::fmt::Display;
use std::str::FromStr;

use realm_services::forms::parse_metadata;
use realm_services::{ListingForm, ServiceError, StipendOutcome};
use realm_types::{AcquisitionId, CodeId, CollectibleId, ListingId, QuestId, Rarity, View};
use serde_json::Value;

use crate::app::App;
use crate::error::AppError;

/// Text printed by `help`.
pub const HELP: &str = "\
commands:
  view <dashboard|collection|redeem|marketplace|quests|admin>
  theme                          toggle light/dark
  signin <email> <password>
  signup <email> <password> [metadata-json]
  signout
  stipend                        claim the daily stipend
  quests                         assign today's quests
  progress <quest-id>            advance a quest
  redeem <code>
  search <text>                  filter the collection
  rarity <tier|all>              filter the collection
  convert <acquisition-id>       turn a copy into currency
  buy <listing-id>
  sell <collectible-id> <gold> [gems]
  sort <newest|priceAsc|priceDesc|rarity>
  market-rarity <tier|all>
  code <json>                    create a redemption code
  deactivate <code-id>
  ping | online | offline
  state | logs [n] | help | quit";

/// One parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the command list.
    Help,
    /// Switch views.
    View(View),
    /// Toggle the theme.
    Theme,
    /// Sign in.
    SignIn {
        /// Email.
        email: String,
        /// Password.
        password: String,
    },
    /// Register.
    SignUp {
        /// Email.
        email: String,
        /// Password.
        password: String,
        /// Raw JSON metadata.
        metadata: String,
    },
    /// Sign out.
    SignOut,
    /// Claim the daily stipend.
    Stipend,
    /// Assign today's quests.
    RefreshQuests,
    /// Advance a quest.
    Progress(QuestId),
    /// Redeem a code.
    Redeem(String),
    /// Filter the collection by text.
    Search(String),
    /// Filter the collection by tier.
    Rarity(Option<Rarity>),
    /// Convert a duplicate.
    Convert(AcquisitionId),
    /// Buy a listing.
    Buy(ListingId),
    /// List a collectible.
    Sell {
        /// Collectible offered.
        collectible_id: CollectibleId,
        /// Gold price.
        gold: i64,
        /// Gem price.
        gems: i64,
    },
    /// Sort the marketplace.
    Sort(String),
    /// Filter the marketplace by tier.
    MarketRarity(Option<Rarity>),
    /// Create a redemption code from JSON.
    Code(String),
    /// Deactivate a redemption code.
    Deactivate(CodeId),
    /// Probe the backend.
    Ping,
    /// Report connectivity.
    Online(bool),
    /// Print the state snapshot.
    State,
    /// Print recent log records.
    Logs(usize),
    /// Leave the shell.
    Quit,
}

/// What the prompt should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Print the text and read the next line.
    Continue(String),
    /// Leave the shell.
    Quit,
}

fn invalid(message: impl Into<String>) -> ServiceError {
    ServiceError::InvalidInput(message.into())
}

fn id<T>(raw: Option<&str>, what: &str) -> Result<T, ServiceError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = raw.ok_or_else(|| invalid(format!("missing {what}")))?;
    raw.parse()
        .map_err(|e| invalid(format!("`{raw}` is not a valid {what}: {e}")))
}

fn rarity(raw: Option<&str>) -> Result<Option<Rarity>, ServiceError> {
    match raw {
        None | Some("all") => Ok(None),
        Some(raw) => Rarity::parse(raw)
            .map(Some)
            .ok_or_else(|| invalid(format!("unknown rarity `{raw}`"))),
    }
}

fn amount(raw: Option<&str>) -> Result<i64, ServiceError> {
    raw.map_or(Ok(0), |raw| {
        raw.parse()
            .map_err(|e| invalid(format!("`{raw}` is not an amount: {e}")))
    })
}

impl Command {
    /// Parse one line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, ServiceError> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let mut args = rest.split_whitespace();

        let command = match verb {
            "" => return Ok(None),
            "help" | "?" => Self::Help,
            "view" => {
                let key = args.next().unwrap_or_default();
                let view = View::parse(key).ok_or_else(|| invalid(format!("unknown view `{key}`")))?;
                Self::View(view)
            }
            "theme" => Self::Theme,
            "signin" => Self::SignIn {
                email: args.next().unwrap_or_default().to_owned(),
                password: args.next().unwrap_or_default().to_owned(),
            },
            "signup" => {
                let email = args.next().unwrap_or_default().to_owned();
                let password = args.next().unwrap_or_default().to_owned();
                let metadata = args.collect::<Vec<_>>().join(" ");
                Self::SignUp {
                    email,
                    password,
                    metadata,
                }
            }
            "signout" => Self::SignOut,
            "stipend" => Self::Stipend,
            "quests" => Self::RefreshQuests,
            "progress" => Self::Progress(id(args.next(), "quest id")?),
            "redeem" => Self::Redeem(rest.to_owned()),
            "search" => Self::Search(rest.to_owned()),
            "rarity" => Self::Rarity(rarity(args.next())?),
            "convert" => Self::Convert(id(args.next(), "acquisition id")?),
            "buy" => Self::Buy(id(args.next(), "listing id")?),
            "sell" => Self::Sell {
                collectible_id: id(args.next(), "collectible id")?,
                gold: amount(args.next())?,
                gems: amount(args.next())?,
            },
            "sort" => Self::Sort(args.next().unwrap_or_default().to_owned()),
            "market-rarity" => Self::MarketRarity(rarity(args.next())?),
            "code" => Self::Code(rest.to_owned()),
            "deactivate" => Self::Deactivate(id(args.next(), "code id")?),
            "ping" => Self::Ping,
            "online" => Self::Online(true),
            "offline" => Self::Online(false),
            "state" => Self::State,
            "logs" => Self::Logs(match args.next() {
                Some(raw) => raw
                    .parse()
                    .map_err(|e| invalid(format!("`{raw}` is not a count: {e}")))?,
                None => 20,
            }),
            "quit" | "exit" => Self::Quit,
            other => return Err(invalid(format!("unknown command `{other}`, try `help`"))),
        };
        Ok(Some(command))
    }
}

/// Run `command` against `app`.
///
/// Service failures are reported in the reply; only a missing module or a
/// failed preferences write is an error.
pub async fn execute(app: &App, command: Command) -> Result<Reply, AppError> {
    let text = match run(app, command).await {
        Ok(Some(text)) => text,
        Ok(None) => return Ok(Reply::Quit),
        Err(AppError::Service { source }) => format!("error: {source}"),
        Err(other) => return Err(other),
    };
    Ok(Reply::Continue(text))
}

async fn run(app: &App, command: Command) -> Result<Option<String>, AppError> {
    let ctx = app.context();
    let text = match command {
        Command::Help => HELP.to_owned(),
        Command::View(view) => {
            app.navigation()?.navigate(view);
            format!("showing {}", view.as_str())
        }
        Command::Theme => format!("theme: {}", app.layout()?.toggle_theme()?.as_str()),
        Command::SignIn { email, password } => {
            let response = ctx.services.session.sign_in(&email, &password).await?;
            format!("signed in as {}", response.user.id)
        }
        Command::SignUp {
            email,
            password,
            metadata,
        } => {
            let metadata = parse_metadata(&metadata)?;
            let response = ctx.services.session.sign_up(&email, &password, metadata).await?;
            format!("registered {}", response.user.id)
        }
        Command::SignOut => {
            ctx.services.session.sign_out().await?;
            "signed out".to_owned()
        }
        Command::Stipend => match app.dashboard()?.claim_stipend().await? {
            StipendOutcome::Granted(wallet) => format!(
                "stipend granted: {} gold, {} gems",
                wallet.gold_balance, wallet.gem_balance
            ),
            StipendOutcome::AlreadyClaimed {
                hours_remaining, ..
            } => {
                format!("come back in {hours_remaining}h")
            }
        },
        Command::RefreshQuests => {
            let assigned = app.dashboard()?.refresh_quests().await?;
            let count = assigned.as_array().map_or(0, Vec::len);
            format!("{count} new quests")
        }
        Command::Progress(quest_id) => {
            let quest = app.quests()?.progress(quest_id).await?;
            format!("quest progress: {}", quest.progress)
        }
        Command::Redeem(code) => app.redeem()?.submit(&code).await.message().to_owned(),
        Command::Search(text) => {
            app.collection()?.search(&text);
            format!("search: {text}")
        }
        Command::Rarity(tier) => {
            app.collection()?.filter_rarity(tier);
            format!("rarity: {}", tier.map_or("all", Rarity::as_str))
        }
        Command::Convert(acquisition_id) => match app
            .collection()?
            .convert_duplicate(acquisition_id)
            .await?
        {
            Some(wallet) => format!(
                "converted: {} gold, {} gems",
                wallet.gold_balance, wallet.gem_balance
            ),
            None => "no such copy in your collection".to_owned(),
        },
        Command::Buy(listing_id) => {
            let listing = app.marketplace()?.purchase(listing_id).await?;
            format!("bought listing {}", listing.id)
        }
        Command::Sell {
            collectible_id,
            gold,
            gems,
        } => {
            let form = ListingForm {
                collectible_id,
                price_gold: gold,
                price_gems: gems,
                expires_at: None,
            };
            let listing = app.marketplace()?.list(&form).await?;
            format!("listed as {}", listing.id)
        }
        Command::Sort(id) => format!("sort: {}", app.marketplace()?.set_sort(&id)?.id()),
        Command::MarketRarity(tier) => {
            app.marketplace()?.filter_rarity(tier);
            format!("marketplace rarity: {}", tier.map_or("all", Rarity::as_str))
        }
        Command::Code(raw) => {
            let code = app.admin()?.submit_json(&raw).await?;
            format!("created {} ({})", code.code, code.id)
        }
        Command::Deactivate(code_id) => {
            let code = app.admin()?.deactivate(code_id).await?;
            format!("deactivated {}", code.code)
        }
        Command::Ping => {
            let reachable = ctx.services.network.ping().await;
            if reachable { "backend reachable" } else { "backend unreachable" }.to_owned()
        }
        Command::Online(online) => {
            ctx.services.network.set_online(online);
            if online { "online" } else { "offline" }.to_owned()
        }
        Command::State => serde_json::to_string_pretty(&*app.state())
            .map_err(|e| AppError::Service { source: e.into() })?,
        Command::Logs(count) => {
            let records = ctx.history.records();
            let skip = records.len().saturating_sub(count);
            records
                .iter()
                .skip(skip)
                .map(|r| {
                    let fields = Value::Object(r.fields.clone());
                    format!(
                        "{} {:5} [{}] {} {fields}",
                        r.timestamp.format("%H:%M:%S"),
                        r.level,
                        r.scope,
                        r.message
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        Command::Quit => return Ok(None),
    };
    Ok(Some(text))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        Command::parse(line).unwrap().unwrap()
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn free_text_arguments_keep_their_spaces() {
        assert_eq!(parse("redeem  spring bloom "), Command::Redeem("spring bloom".into()));
        assert_eq!(parse("search ember fox"), Command::Search("ember fox".into()));
        assert_eq!(
            parse(r#"code {"code": "harvest-moon", "reward_gold": 5}"#),
            Command::Code(r#"{"code": "harvest-moon", "reward_gold": 5}"#.into())
        );
    }

    #[test]
    fn views_and_rarities_are_validated() {
        assert_eq!(parse("view marketplace"), Command::View(View::Marketplace));
        assert_eq!(parse("rarity all"), Command::Rarity(None));
        assert_eq!(parse("market-rarity epic"), Command::MarketRarity(Some(Rarity::Epic)));
        assert!(Command::parse("view attic").is_err());
        assert!(Command::parse("rarity shiny").is_err());
    }

    #[test]
    fn ids_and_amounts_are_parsed() {
        let listing = ListingId::new();
        assert_eq!(parse(&format!("buy {listing}")), Command::Buy(listing));
        assert!(Command::parse("buy not-a-uuid").is_err());

        let collectible = CollectibleId::new();
        assert_eq!(
            parse(&format!("sell {collectible} 120")),
            Command::Sell {
                collectible_id: collectible,
                gold: 120,
                gems: 0
            }
        );
        assert!(Command::parse(&format!("sell {collectible} lots")).is_err());
    }

    #[test]
    fn unknown_verbs_point_at_help() {
        let error = Command::parse("dance").unwrap_err();
        assert!(error.to_string().contains("try `help`"));
        assert_eq!(parse("logs"), Command::Logs(20));
        assert_eq!(parse("exit"), Command::Quit);
    }
}
