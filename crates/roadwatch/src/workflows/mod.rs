pub mod issues;
pub mod seed;
