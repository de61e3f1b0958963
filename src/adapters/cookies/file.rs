use super::{Cookie, CookieError, CookieStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

type Jar = BTreeMap<String, Cookie>;

/// Cookie jar persisted as a JSON file, for command-line sessions.
///
/// Every write rewrites the whole file through a temporary sibling and a rename.
#[derive(Debug)]
pub struct FileCookieStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Jar, CookieError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Jar::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Jar::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, jar: &Jar) -> Result<(), CookieError> {
        let bytes = serde_json::to_vec_pretty(jar)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CookieStore for FileCookieStore {
    async fn get_cookie(&self, name: &str) -> Result<Option<Cookie>, CookieError> {
        let jar = self.load().await?;
        Ok(jar.get(name).filter(|c| !c.is_expired()).cloned())
    }

    async fn set_cookie(&self, cookie: Cookie) -> Result<(), CookieError> {
        let _guard = self.write_lock.lock().await;
        let mut jar = self.load().await?;
        jar.retain(|_, c| !c.is_expired());
        jar.insert(cookie.name.clone(), cookie);
        self.save(&jar).await
    }

    async fn remove_cookie(&self, name: &str) -> Result<(), CookieError> {
        let _guard = self.write_lock.lock().await;
        let mut jar = self.load().await?;
        if jar.remove(name).is_some() {
            self.save(&jar).await?;
        }
        Ok(())
    }
}
