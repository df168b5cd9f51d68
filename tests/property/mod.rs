//! Property-based tests
//!
//! Uses proptest to generate event sequences and check the reconciliation
//! invariants hold for all of them.

mod reconciliation_proptest;
mod status_proptest;
