use core::fmt;
use kernel_bitmap::Bitmap;
use kernel_sync::SpinLock;
use log::{trace, warn};

/// A synchronized pool of `capacity` tokens numbered `0..capacity`.
///
/// [`acquire`](Self::acquire) always hands out the lowest free token.
pub struct TokenPool {
    name: &'static str,
    map: SpinLock<Bitmap>,
}

impl TokenPool {
    /// A pool with every token free. `name` only appears in log messages.
    #[must_use]
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            map: SpinLock::new(Bitmap::new(capacity)),
        }
    }

    /// Claim a free token, or `None` if all are held.
    pub fn acquire(&self) -> Option<usize> {
        let token = self.map.with_lock(Bitmap::find);
        match token {
            Some(token) => trace!("{}: acquired {token}", self.name),
            None => warn!("{}: exhausted ({} held)", self.name, self.capacity()),
        }
        token
    }

    /// Return `token` to the pool.
    ///
    /// # Panics
    /// If `token` is out of range or not currently held.
    pub fn release(&self, token: usize) {
        self.map.with_lock(|map| {
            assert!(map.test(token), "{}: released token {token} that is not held", self.name);
            map.clear(token);
        });
        trace!("{}: released {token}", self.name);
    }

    /// Whether `token` is currently held.
    ///
    /// # Panics
    /// If `token` is out of range.
    #[must_use]
    pub fn is_held(&self, token: usize) -> bool {
        self.map.with_lock(|map| map.test(token))
    }

    /// Number of free tokens.
    #[must_use]
    pub fn available(&self) -> usize {
        self.map.with_lock(|map| map.num_clear())
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.map.with_lock(|map| map.len())
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for TokenPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPool")
            .field("name", &self.name)
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .finish()
    }
}

/// Lists the held tokens.
impl fmt::Display for TokenPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.name)?;
        self.map.with_lock(|map| fmt::Display::fmt(map, f))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hands_out_lowest_free_token() {
        let pool = TokenPool::new("test", 3);
        assert_eq!(pool.acquire(), Some(0));
        assert_eq!(pool.acquire(), Some(1));
        pool.release(0);
        assert_eq!(pool.acquire(), Some(0));
        assert_eq!(pool.acquire(), Some(2));
        assert_eq!(pool.acquire(), None);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    #[should_panic(expected = "not held")]
    fn double_release_is_fatal() {
        let pool = TokenPool::new("test", 2);
        let token = pool.acquire().unwrap();
        pool.release(token);
        pool.release(token);
    }

    #[test]
    fn display_lists_held_tokens() {
        let pool = TokenPool::new("frames", 4);
        pool.acquire();
        pool.acquire();
        assert_eq!(alloc::format!("{pool}"), "frames: Bitmap set (2/4): 0 1");
    }
}
