pub mod balance;
pub mod simulation;
