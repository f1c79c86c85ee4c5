pub mod poll;

pub use poll::{refresh_once, PollConfig, PollHandle, Refresher};
