// handlers/mod.rs - 3-tier handler architecture
//
// Public (no auth) → Protected (JWT auth) → Elevated (admin JWT auth)
pub mod elevated;
pub mod protected;
pub mod public;
