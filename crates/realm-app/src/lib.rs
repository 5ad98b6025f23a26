//! Application shell of the Collectible Realm client.
//!
//! - [`app`] -- bootstrap and the running [`App`]
//! - [`context`] -- shared handles given to every view module
//! - [`modules`] -- one module per region of the shell
//! - [`surface`] -- render frames and where they are drawn
//! - [`preferences`] -- client-local settings such as the theme
//! - [`shell`] -- line commands driving the modules
//! - [`demo`] -- a seeded in-memory realm

pub mod app;
pub mod context;
pub mod demo;
pub mod error;
pub mod modules;
pub mod preferences;
pub mod shell;
pub mod surface;

pub use app::App;
pub use context::AppContext;
pub use error::AppError;
pub use preferences::Preferences;
pub use surface::{LogSurface, RecordingSurface, Region, RenderFrame, Surface};
