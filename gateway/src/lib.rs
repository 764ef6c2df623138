pub mod assistant;
pub mod configuration;
pub mod driver;
pub mod graph;
pub mod llm;
pub mod search;
pub mod server;
pub mod toolbox;

pub use assistant::configuration::ResearchConfig;
pub use assistant::graph::report_graph;
pub use assistant::state::{ReportState, Section};
pub use configuration::Settings;
pub use driver::{PlanFeedback, ResearchDriver};

use dotenv::dotenv;

pub fn init() {
    dotenv().ok();
}
