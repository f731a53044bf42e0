use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Holds a model that is created at most once.
///
/// Concurrent callers of [`ModelLoader::load`] wait for the first construction
/// instead of racing to build their own copy. A failed construction leaves the
/// loader empty, the error goes back to whoever triggered it.
pub(crate) struct ModelLoader<T> {
    model: OnceCell<Arc<T>>,
}

impl<T> ModelLoader<T> {
    pub const fn new() -> Self {
        Self {
            model: OnceCell::const_new(),
        }
    }

    pub async fn load<F, Fut>(&self, create_model: F) -> anyhow::Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let model = self
            .model
            .get_or_try_init(|| async {
                debug!("loading model");
                create_model().await.map(Arc::new)
            })
            .await?;

        Ok(model.clone())
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.model.get().cloned()
    }
}
