pub mod engine;
pub mod rules;

pub use engine::Labeler;
