use crate::output::print_json;
use actions_core::config::Config;
use actions_core::envelope::InvocationEvent;
use actions_core::handlers::HandlerKind;
use actions_core::ActionRouter;
use anyhow::{anyhow, Context};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Run one event through a handler and print the response envelope.
///
/// The envelope is always printed as JSON; handler failures are reported
/// inside it rather than through the exit code.
pub fn run(config: Config, handler: Option<&str>, event: Option<&Path>) -> anyhow::Result<()> {
    let kind = match handler {
        Some(name) => name.parse::<HandlerKind>().map_err(|e| anyhow!("{e}"))?,
        None => config
            .handler
            .ok_or_else(|| anyhow!("no handler given; pass --handler or set ACTIONS_HANDLER"))?,
    };
    let event = read_event(event)?;

    let rt = tokio::runtime::Runtime::new()?;
    let envelope = rt.block_on(async move {
        let backends = actions_aws::build_backends(&config)
            .await
            .context("failed to initialise backends")?;
        let router = ActionRouter::new(Arc::new(config), backends);
        Ok::<_, anyhow::Error>(router.invoke(kind, event).await)
    })?;
    print_json(&envelope)
}

fn read_event(path: Option<&Path>) -> anyhow::Result<InvocationEvent> {
    let raw = match path {
        Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
            .with_context(|| format!("failed to read event file {}", p.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read event from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("event is not a valid invocation document")
}
