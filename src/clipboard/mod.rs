pub mod classifier;
pub mod events;
pub mod format;
pub mod hash;
pub mod ignore;
pub mod item;
pub mod monitor;
pub mod paste;
pub mod pasteboard;
