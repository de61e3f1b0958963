use super::{Cookie, CookieError, CookieStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Process-local cookie jar.
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    cookies: Mutex<HashMap<String, Cookie>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all live cookies, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .values()
            .filter(|c| !c.is_expired())
            .map(|c| c.name.clone())
            .collect();
        names.sort();
        names
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Cookie>> {
        self.cookies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CookieStore for MemoryCookieStore {
    async fn get_cookie(&self, name: &str) -> Result<Option<Cookie>, CookieError> {
        let mut cookies = self.lock();
        if cookies.get(name).is_some_and(Cookie::is_expired) {
            cookies.remove(name);
            return Ok(None);
        }
        Ok(cookies.get(name).cloned())
    }

    async fn set_cookie(&self, cookie: Cookie) -> Result<(), CookieError> {
        self.lock().insert(cookie.name.clone(), cookie);
        Ok(())
    }

    async fn remove_cookie(&self, name: &str) -> Result<(), CookieError> {
        self.lock().remove(name);
        Ok(())
    }
}
