//! Integration test framework for the gNB procedure core
#![allow(missing_docs)]
//!
//! This crate provides recording mock collaborators and helpers for scenario
//! tests that span several components.
//!
//! # Components
//!
//! - [`mocks`] - Mock MAC units, E1AP/F1AP/RRC peers and result sinks that
//!   record every message into a shared [`CallLog`]
//! - [`test_utils`] - Logging setup, bounded waits and call-order checks
//!
//! # Test Categories
//!
//! 1. **PDU Session Setup** - stage order, message content and failure handling
//! 2. **MAC UE Procedures** - create, reconfigure and delete against UL/DL MAC
//! 3. **DU UE Lifecycle** - DU manager on top of the MAC control component
//! 4. **UE Sequencing** - per-UE ordering and cross-UE concurrency

pub mod mocks;

pub use mocks::{
    CallLog, MockE1ap, MockF1ap, MockMacNotifier, MockMacUnit, MockNgap, MockRrc, Outcome,
};
pub use test_utils::{
    assert_in_order, init_test_logging, wait_for_condition, within_timeout, TestResult,
    DEFAULT_POLL_INTERVAL, DEFAULT_TEST_TIMEOUT,
};
