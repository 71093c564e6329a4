//! Engine behind a lock, for firmware that touches storage from more than
//! one context.
//!
//! The scan cursor and the session are engine-wide, so the lock covers the
//! whole engine. A file session held across two `lock()` calls is still the
//! only session: another context that calls [`LightFs::create`] in between
//! gets [`Error::InvalidState`](crate::Error::InvalidState).

use spin::{Mutex, MutexGuard};

use crate::fs::LightFs;
use crate::store::BlockStore;

pub struct SharedFs<S: BlockStore> {
    inner: Mutex<LightFs<S>>,
}

impl<S: BlockStore> SharedFs<S> {
    pub const fn new(fs: LightFs<S>) -> Self {
        Self {
            inner: Mutex::new(fs),
        }
    }

    /// Spin until the engine is free and return a guard to it.
    pub fn lock(&self) -> MutexGuard<'_, LightFs<S>> {
        self.inner.lock()
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, LightFs<S>>> {
        self.inner.try_lock()
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut LightFs<S>) -> R) -> R {
        let mut fs = self.inner.lock();
        f(&mut *fs)
    }

    pub fn into_inner(self) -> LightFs<S> {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::RamStore;

    #[test]
    fn whole_file_under_one_lock() {
        let mut mem = [0xFFu8; 4 * 16];
        let fs = LightFs::init(RamStore::new(&mut mem, 4, 16).unwrap()).unwrap();
        let shared = SharedFs::new(fs);

        shared
            .with(|fs| {
                fs.create(3)?;
                fs.write(b"hello")?;
                fs.save()
            })
            .unwrap();

        let mut buf = [0u8; 5];
        {
            let mut fs = shared.lock();
            assert!(shared.try_lock().is_none());
            fs.open(3).unwrap();
            fs.read(&mut buf).unwrap();
            fs.close().unwrap();
        }
        assert_eq!(&buf, b"hello");
        assert!(shared.try_lock().is_some());
    }

    #[test]
    fn session_survives_between_locks() {
        let mut mem = [0xFFu8; 4 * 16];
        let fs = LightFs::init(RamStore::new(&mut mem, 4, 16).unwrap()).unwrap();
        let shared = SharedFs::new(fs);

        shared.lock().create(1).unwrap();
        assert_eq!(shared.lock().open(1), Err(Error::InvalidState));
        shared.lock().save().unwrap();

        let fs = shared.into_inner();
        assert_eq!(&fs.store().as_bytes()[..5], &[0x81, 0xFF, 0xFF, 0, 0]);
    }
}
