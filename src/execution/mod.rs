/// Query execution seam: submit, poll, and terminal-state handling.
pub mod gateway;
/// End-to-end merge runs over a catalog and an executor.
pub mod runner;
