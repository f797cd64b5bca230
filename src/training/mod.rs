pub mod corpus;
pub mod metrics;
pub mod trainer;

pub use corpus::Corpus;
pub use trainer::{ModelTrainer, RetrainRequest, RetrainResponse, TrainingStatus, TriggeredBy};
