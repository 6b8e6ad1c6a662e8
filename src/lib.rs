pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod reader;
pub mod story;


pub use error::*;
pub use models::*;
pub use reader::StoryReader;
pub use story::{PayloadLookup, StoryNarration, StoryPage, VoiceCategory};
