//! Engine services: the analysis pipeline and everything it leans on

pub mod analyzer;
pub mod feedback;
pub mod rules;
pub mod scorer;
pub mod similarity;
pub mod stats;
pub mod tasks;
pub mod verdicts;
