pub mod civ;
pub mod cli;
pub mod config;
pub mod conflict;
pub mod diplomacy;
pub mod events;
pub mod persistence;
pub mod simulation;
pub mod trade;
pub mod world;
