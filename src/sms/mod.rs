pub mod patterns;
pub mod preprocess;
pub mod types;

pub use preprocess::{preprocess, Feature, FeatureVector, FEATURE_COUNT};
pub use types::{
    Category, Label, LabelResult, Method, PaymentMethod, RawMessage, Transaction,
    TransactionType,
};
