//! Query understanding: section/title/free-text classification and
//! keyword-based document routing.
pub mod classifier;
pub mod normalize;
pub mod routing;

pub use classifier::{ClassifiedQuery, QueryClassification, QueryClassifier};
pub use routing::{DocumentRouter, RouteMatch};
