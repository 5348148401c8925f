use std::{
    cell::RefCell,
    ops::{Deref, DerefMut},
    rc::Rc,
};

use rooknet_serde::BitWriter;

/// Pool of reusable [`BitWriter`] backing buffers. Writers are borrowed for
/// the duration of one encode through [`BufferPool::acquire`]; the guard
/// returns them on drop, on every exit path including early returns and
/// panics, so there is no manual release call to forget. A returned writer
/// is reset before it re-enters the pool, and a moved-out guard cannot be
/// used again, so stale-buffer misuse is unrepresentable.
///
/// The whole runtime is single-threaded and tick-driven; the pool is
/// deliberately not `Sync`.
#[derive(Clone)]
pub struct BufferPool {
    free: Rc<RefCell<Vec<BitWriter>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self {
            free: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn acquire(&self) -> PooledWriter {
        let writer = self.free.borrow_mut().pop().unwrap_or_default();
        PooledWriter {
            writer: Some(writer),
            free: Rc::clone(&self.free),
        }
    }

    /// Writers currently resting in the pool.
    pub fn available(&self) -> usize {
        self.free.borrow().len()
    }

    /// Drops pooled writers down to `keep`, releasing their buffers.
    pub fn shrink_to(&self, keep: usize) {
        self.free.borrow_mut().truncate(keep);
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped borrow of a pooled [`BitWriter`].
pub struct PooledWriter {
    writer: Option<BitWriter>,
    free: Rc<RefCell<Vec<BitWriter>>>,
}

impl Deref for PooledWriter {
    type Target = BitWriter;

    fn deref(&self) -> &BitWriter {
        self.writer.as_ref().expect("pooled writer already returned!")
    }
}

impl DerefMut for PooledWriter {
    fn deref_mut(&mut self) -> &mut BitWriter {
        self.writer.as_mut().expect("pooled writer already returned!")
    }
}

impl Drop for PooledWriter {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            writer.reset();
            self.free.borrow_mut().push(writer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BufferPool;
    use rooknet_serde::BitWrite;

    #[test]
    fn writers_return_on_drop() {
        let pool = BufferPool::new();
        assert_eq!(pool.available(), 0);

        {
            let mut writer = pool.acquire();
            writer.write_byte(0xAB);
        }

        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn returned_writers_come_back_reset() {
        let pool = BufferPool::new();

        {
            let mut writer = pool.acquire();
            writer.write_byte(0xAB);
        }

        let writer = pool.acquire();
        assert_eq!(writer.bits_written(), 0);
    }

    #[test]
    fn writers_return_even_when_the_encode_panics() {
        let pool = BufferPool::new();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut writer = pool.acquire();
            writer.write_byte(0x01);
            panic!("encode blew up");
        }));

        assert!(result.is_err());
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn shrink_releases_buffers() {
        let pool = BufferPool::new();
        {
            let _a = pool.acquire();
            let _b = pool.acquire();
            let _c = pool.acquire();
        }
        assert_eq!(pool.available(), 3);

        pool.shrink_to(1);
        assert_eq!(pool.available(), 1);
    }
}
