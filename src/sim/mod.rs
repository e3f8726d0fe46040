// Simulation entrypoint
pub mod market;  // symbol table and venue labels
pub mod driver;  // one tick of book evolution over the authoritative state
pub mod runner;  // tokio loop that keeps the market ticking
