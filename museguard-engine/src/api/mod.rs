//! HTTP API handlers for the compliance engine

pub mod analyze;
pub mod feedback;
pub mod health;
pub mod rules;
pub mod settings;
pub mod verdicts;

pub use analyze::analyze_routes;
pub use feedback::feedback_routes;
pub use health::health_routes;
pub use rules::rule_routes;
pub use settings::settings_routes;
pub use verdicts::verdict_routes;
