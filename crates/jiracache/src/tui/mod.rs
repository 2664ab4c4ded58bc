mod core;
mod editor;
mod runtime;
mod view;

use jiracache_core::config::ConfigFile;

use crate::channel::{Channel, ServerAddr};

pub async fn run(addr: &ServerAddr, config: ConfigFile) -> anyhow::Result<()> {
    let channel = Channel::connect(addr).await?;
    runtime::run(channel, config).await
}
