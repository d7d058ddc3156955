//! Size validation against the block manager. See `spec.md` §4.1.

use crate::error::{Error, Result};
use std::sync::Arc;

/// Items at or under this size always pass validation without consulting
/// the block manager at all (the fast path in `spec.md` §4.1).
pub const ONE_GIB: u64 = 1 << 30;

/// The block manager's sizing contract: given a proposed size, either round
/// it up to a valid block size (in place) or reject it.
pub trait BlockManager: Send + Sync {
    /// Verifies/rounds a proposed write size. `size` is updated in place to
    /// the rounded size on success.
    fn write_size(&self, size: &mut u64) -> Result<()>;

    /// The tree's absolute maximum object size. Items over `ONE_GIB` must
    /// additionally be under this limit.
    fn max_object_size(&self) -> u64;
}

/// A simple block manager that rounds sizes up to a fixed block size and
/// rejects anything over a configured absolute maximum.
#[derive(Debug, Clone)]
pub struct SimpleBlockManager {
    block_size: u64,
    max_object_size: u64,
}

impl SimpleBlockManager {
    pub fn new(block_size: u64, max_object_size: u64) -> Self {
        assert!(block_size > 0, "block size must be nonzero");
        Self {
            block_size,
            max_object_size,
        }
    }
}

impl Default for SimpleBlockManager {
    fn default() -> Self {
        Self::new(4096, 2 * (1 << 30))
    }
}

impl BlockManager for SimpleBlockManager {
    fn write_size(&self, size: &mut u64) -> Result<()> {
        if *size > self.max_object_size {
            return Err(Error::InvalidArgument(format!(
                "item size {} exceeds maximum object size {}",
                *size, self.max_object_size
            )));
        }
        let rounded = size.div_ceil(self.block_size) * self.block_size;
        *size = rounded;
        Ok(())
    }

    fn max_object_size(&self) -> u64 {
        self.max_object_size
    }
}

pub fn default_block_manager() -> Arc<dyn BlockManager> {
    Arc::new(SimpleBlockManager::default())
}

/// Validates a caller-supplied item per `spec.md` §4.1: items at or under
/// one gigabyte pass unconditionally; larger items must be under the
/// tree's absolute max and pass the block manager's `write_size` check.
pub fn validate_item_size(block_manager: &dyn BlockManager, size: u64) -> Result<()> {
    if size <= ONE_GIB {
        return Ok(());
    }
    if size > block_manager.max_object_size() {
        return Err(Error::InvalidArgument(format!(
            "item size {} exceeds maximum object size {}",
            size,
            block_manager.max_object_size()
        )));
    }
    let mut rounded = size;
    block_manager.write_size(&mut rounded).map_err(|e| {
        Error::InvalidArgument(format!("item size {} rejected by block manager: {}", size, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_at_or_under_one_gib_pass_unconditionally() {
        let bm = SimpleBlockManager::new(4096, 1024); // max smaller than ONE_GIB on purpose
        assert!(validate_item_size(&bm, ONE_GIB).is_ok());
        assert!(validate_item_size(&bm, 10).is_ok());
    }

    #[test]
    fn items_over_one_gib_must_be_under_absolute_max() {
        let bm = SimpleBlockManager::new(4096, ONE_GIB + 100);
        assert!(validate_item_size(&bm, ONE_GIB + 1).is_ok());
        assert!(validate_item_size(&bm, ONE_GIB + 1_000_000).is_err());
    }

    #[test]
    fn write_size_rounds_up_to_block_size() {
        let bm = SimpleBlockManager::new(4096, ONE_GIB * 4);
        let mut size = ONE_GIB + 1;
        bm.write_size(&mut size).unwrap();
        assert_eq!(size % 4096, 0);
        assert!(size >= ONE_GIB + 1);
    }
}
