use faker_server::{Config, Server, init_logger_with_file, print_banner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境变量 (.env 可选)
    dotenv::dotenv().ok();

    // 2. 加载配置
    let config = Config::from_env();

    // 3. 日志
    init_logger_with_file(&config.log_level, config.log_json, config.log_dir.as_deref())?;

    print_banner();
    tracing::info!(
        addr = %config.listen_addr(),
        work_dir = %config.work_dir,
        "🖨️ Printer faker starting..."
    );

    // 4. 启动服务，直到 Ctrl-C
    let server = Server::new(config);
    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "Server error");
        return Err(e.into());
    }

    Ok(())
}
