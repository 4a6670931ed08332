//! Tables of the legacy tracker. The schema is owned by that tracker;
//! these definitions only mirror it.

pub mod activity;
pub mod game;
pub mod user;
