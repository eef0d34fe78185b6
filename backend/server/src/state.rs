use std::sync::Arc;

use store::Backend;

use super::{config::Config, database::init_backend};

pub struct State {
    pub config: Config,
    pub backend: Backend,
}

impl State {
    pub async fn new() -> anyhow::Result<Arc<Self>> {
        let config = Config::load()?;

        let backend = init_backend(&config).await?;

        Ok(Self::from_parts(config, backend))
    }

    pub fn from_parts(config: Config, backend: Backend) -> Arc<Self> {
        Arc::new(Self { config, backend })
    }
}
