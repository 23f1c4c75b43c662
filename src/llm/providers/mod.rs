pub mod chart;
pub mod openai;
