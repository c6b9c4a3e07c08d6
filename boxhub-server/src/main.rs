use boxhub_server::{Config, Server, ServerState, print_banner, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 设置环境 (dotenv, 日志)
    setup_environment()?;

    print_banner();
    tracing::info!("📦 BoxHub server starting...");

    // 2. 加载配置
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;
    tracing::info!(environment = %config.environment, port = config.http_port, "Configuration loaded");

    // 3. 初始化服务器状态 (数据库不可用时直接退出)
    let state = ServerState::initialize(&config).await?;

    // 4. 启动 HTTP 服务器
    let server = Server::with_state(config, state);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
