pub mod game;
pub mod live;
pub mod platform;
pub mod session;
pub mod user;

pub use game::Game;
pub use live::{Live, Stopped};
pub use platform::Platform;
pub use session::{Candidate, Session};
pub use user::User;
