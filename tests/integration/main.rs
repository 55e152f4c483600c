//! Integration test driver for `tests/integration/`.
//!
//! Every test drives the dispatch engine on a virtual timeline with a
//! recording communication port, so timing is exact and nothing sleeps.

mod dispatch_scenarios;
mod manual_tests;
mod mock_comms;
