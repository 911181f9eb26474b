use actions_core::config::Config;
use actions_core::ActionRouter;
use anyhow::Context;
use std::sync::Arc;

pub fn run(config: Config, port: u16) -> anyhow::Result<()> {
    let warnings = config.validate();
    for w in &warnings {
        tracing::warn!(level = ?w.level, "{}", w.message);
    }
    if Config::has_errors(&warnings) {
        anyhow::bail!("refusing to serve with an invalid configuration; run `actions config check`");
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let backends = actions_aws::build_backends(&config)
            .await
            .context("failed to initialise backends")?;
        let router = Arc::new(ActionRouter::new(Arc::new(config), backends));
        actions_server::serve(router, port).await
    })
}
