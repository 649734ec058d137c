//! 应用启动器 - 负责依赖注入和服务启动

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info};
use user_service_core::ServiceHelper;
use user_service_core::config::AppConfig;

use crate::config::{DEFAULT_GRPC_PORT, DEFAULT_HTTP_PORT};
use crate::interface::grpc::GrpcServer;
use crate::interface::http::HttpServer;
use crate::service::wire::{self, ApplicationContext};

/// 命令行指定的端口，优先于配置文件
#[derive(Debug, Clone, Copy, Default)]
pub struct ListenOverrides {
    pub grpc_port: Option<u16>,
    pub http_port: Option<u16>,
}

/// 应用启动器
pub struct ApplicationBootstrap;

impl ApplicationBootstrap {
    /// 运行应用的主入口点
    pub async fn run(config: &'static AppConfig, overrides: ListenOverrides) -> Result<()> {
        let context = wire::initialize(config).await?;
        let (grpc_addr, http_addr) = Self::listen_addresses(config, overrides)?;

        info!(
            service = %context.settings.service_name,
            grpc = %grpc_addr,
            http = %http_addr,
            "Starting user service"
        );
        Self::start_servers(context, grpc_addr, http_addr).await
    }

    /// 解析 gRPC 与 HTTP 监听地址
    pub fn listen_addresses(
        config: &AppConfig,
        overrides: ListenOverrides,
    ) -> Result<(SocketAddr, SocketAddr)> {
        let service_config = config.user_service();
        let runtime = &service_config.runtime;
        let grpc_fallback = if config.server.port > 0 {
            config.server.port
        } else {
            DEFAULT_GRPC_PORT
        };

        let mut grpc_addr =
            ServiceHelper::parse_server_addr(config, runtime.server.as_ref(), grpc_fallback)
                .context("invalid gRPC server address")?;
        let mut http_addr =
            ServiceHelper::parse_server_addr(config, runtime.http.as_ref(), DEFAULT_HTTP_PORT)
                .context("invalid HTTP server address")?;

        if let Some(port) = overrides.grpc_port {
            grpc_addr.set_port(port);
        }
        if let Some(port) = overrides.http_port {
            http_addr.set_port(port);
        }
        Ok((grpc_addr, http_addr))
    }

    /// 同时启动 gRPC 服务与 HTTP 网关，收到停止信号后一起退出
    pub async fn start_servers(
        context: ApplicationContext,
        grpc_addr: SocketAddr,
        http_addr: SocketAddr,
    ) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let grpc_server = GrpcServer::new(context.user_grpc, context.admin_grpc, grpc_addr);
        let http_server = HttpServer::new(context.http_state, http_addr);

        let signal_task = tokio::spawn(async move {
            wait_for_signal().await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        });

        let result = tokio::try_join!(
            grpc_server.run(wait_for_shutdown(shutdown_rx.clone())),
            http_server.run(wait_for_shutdown(shutdown_rx)),
        );
        signal_task.abort();

        match result {
            Ok(_) => {
                info!("user service stopped");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "user service failed");
                Err(err)
            }
        }
    }
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
