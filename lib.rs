// Copyright 2023 the Limbo authors. All rights reserved. MIT license.

//! The cursor layer of an embedded, transactional B-tree storage engine:
//! positioning, MVCC visibility, insert/remove/update, and range truncate
//! over a row-store or one of two column-store layouts. See `spec.md` §1.

pub mod block_manager;
pub mod collator;
pub mod cursor;
pub mod error;
pub mod session;
pub mod storage;
pub mod tree;
pub mod txn;
pub mod update;

pub use block_manager::{BlockManager, ONE_GIB};
pub use collator::Collator;
pub use cursor::{Cursor, CursorFlags};
pub use error::{Error, Result};
pub use session::Session;
pub use tree::{Tree, TreeConfig, TreeShape};
