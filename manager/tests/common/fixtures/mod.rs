//! Reusable test utilities:
//! - A recording, failure-injecting fake data store
//! - An in-memory SQLite shop database
//! - A deterministic clock
//! - A fully wired backup environment

// Not every test binary uses every fixture
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod fake_store;
pub mod test_clock;
pub mod test_data;
pub mod test_database;
pub mod test_env;

pub use fake_store::{Access, FakeStore};
pub use test_clock::TestClock;
pub use test_data::*;
pub use test_database::{table_rows, TestDatabase};
pub use test_env::TestEnv;
