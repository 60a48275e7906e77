pub mod lmstudio;

pub use lmstudio::{DecodingPreset, LmStudio};
