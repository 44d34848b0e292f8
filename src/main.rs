use anyhow::Result;
use exam_mapper::utils::logging;
use exam_mapper::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置（缺少 API key 时直接退出）
    let config = Config::from_env().await?;

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
