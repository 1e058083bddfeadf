//! Lock utilities for the shared registry
//!
//! Provides helpers for common lock patterns with automatic release. Guards
//! never escape the closure, so no lock is held while host hooks run.

use std::sync::RwLock;
use tracing::warn;

use crate::load::traits::LoadError;

/// Execute a closure with a read lock, automatically releasing it
///
/// # Example
/// ```rust,ignore
/// use script_loader::utils::with_read_lock;
///
/// let known = with_read_lock(&registry, |r| r.contains_package("dusk.utils"))?;
/// ```
pub fn with_read_lock<T, F, R>(rwlock: &RwLock<T>, f: F) -> Result<R, LoadError>
where
    F: FnOnce(&T) -> R,
{
    match rwlock.read() {
        Ok(guard) => Ok(f(&guard)),
        Err(_) => {
            warn!("Registry read lock poisoned");
            Err(LoadError::RegistryPoisoned)
        }
    }
}

/// Execute a closure with a write lock, automatically releasing it
pub fn with_write_lock<T, F, R>(rwlock: &RwLock<T>, f: F) -> Result<R, LoadError>
where
    F: FnOnce(&mut T) -> R,
{
    match rwlock.write() {
        Ok(mut guard) => Ok(f(&mut guard)),
        Err(_) => {
            warn!("Registry write lock poisoned");
            Err(LoadError::RegistryPoisoned)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_and_write() {
        let lock = RwLock::new(1u32);
        with_write_lock(&lock, |v| *v += 1).unwrap();
        assert_eq!(with_read_lock(&lock, |v| *v).unwrap(), 2);
    }

    #[test]
    fn test_poisoned_lock_is_reported() {
        let lock = std::sync::Arc::new(RwLock::new(0u32));
        let poison = lock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poison.write().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert_eq!(
            with_read_lock(&lock, |v| *v),
            Err(LoadError::RegistryPoisoned)
        );
    }
}
