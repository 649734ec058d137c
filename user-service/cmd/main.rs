use anyhow::Result;
use clap::Parser;
use user_service::{ApplicationBootstrap, ListenOverrides};
use user_service_core::ServiceHelper;
use user_service_core::tracing::init_tracing_from_config;

/// 用户服务：用户目录、认证与视频服务路由
#[derive(Debug, Parser)]
#[command(name = "user-service", version)]
struct Cli {
    /// 配置文件或配置目录
    #[arg(long, env = "USER_SERVICE_CONFIG")]
    config: Option<String>,

    /// gRPC 监听端口
    #[arg(long, env = "GRPC_PORT")]
    grpc_port: Option<u16>,

    /// HTTP 网关监听端口
    #[arg(long, env = "HTTP_PORT")]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let app_config = ServiceHelper::load_config(cli.config.as_deref());
    init_tracing_from_config(Some(&app_config.logging));

    ApplicationBootstrap::run(
        app_config,
        ListenOverrides {
            grpc_port: cli.grpc_port,
            http_port: cli.http_port,
        },
    )
    .await
}
