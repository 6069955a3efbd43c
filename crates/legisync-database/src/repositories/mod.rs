//! PostgreSQL implementations of the storage ports.

pub mod bill;
pub mod checkpoint;
pub mod execution;
pub mod expense;
pub mod legislator;
pub mod vote;

pub use bill::BillRepository;
pub use checkpoint::CheckpointRepository;
pub use execution::ExecutionRepository;
pub use expense::ExpenseRepository;
pub use legislator::LegislatorRepository;
pub use vote::VoteRepository;
