pub mod action;
pub mod categorizer;
pub mod lexicon;
pub mod orchestrator;
pub mod priority;
pub mod summarizer;
