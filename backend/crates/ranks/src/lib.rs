//! Rank definitions and per-player rank membership.
//!
//! A [`RankRegistry`] is built once from the server's rank definitions and
//! handed to whatever needs to resolve rank names, such as
//! [`RankHolder::from_record`]. Nothing in this crate keeps global state.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use ranks::{Rank, RankHolder, RankRecord, RankRegistry, StaticRank};
//!
//! let registry = RankRegistry::new([
//!     Arc::new(StaticRank::new("member", 1)) as Arc<dyn Rank>,
//!     Arc::new(StaticRank::new("moderator", 50).with_staff(true)) as Arc<dyn Rank>,
//! ]);
//! let record = RankRecord::new(["moderator", "member"]);
//!
//! let holder = RankHolder::from_record(&record, &registry).expect("ranks are registered");
//! assert!(holder.staff());
//! assert_eq!(holder.permission_level(), 50);
//! ```

mod error;
mod holder;
mod rank;
mod registry;

pub use error::RankError;
pub use holder::{RankHolder, RankRecord};
pub use rank::{Rank, StaticRank};
pub use registry::RankRegistry;
