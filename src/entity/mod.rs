//! SeaORM entity definitions for the session store.

pub mod game;
pub mod game_alias;
pub mod live_session;
pub mod platform;
pub mod session;
pub mod user;

pub use user::PcPlatform;

/// Abbreviation of the placeholder platform that stands for "some PC".
/// Sessions never reference it; commits resolve it through the user's
/// [`PcPlatform`] preference.
pub const GENERIC_PC: &str = "pc";
