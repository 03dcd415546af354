pub mod block;
pub mod game;
pub mod moment;
pub mod play;
pub mod story;
