pub mod error;
mod report;
mod scatter;

pub use report::{ModelReport, Report};
pub use scatter::ScatterPlot;
