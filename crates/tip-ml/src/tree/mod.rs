pub mod binning;
pub mod decision_tree;
pub mod node;

pub use decision_tree::{DecisionTreeRegressionModel, TreeParams};
pub use node::Node;
