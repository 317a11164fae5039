use std::{net::SocketAddr, time::Duration};

use axum::{
    Router,
    routing::{MethodFilter, on},
};
use axum_server::Handle;
use http::StatusCode;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tracing::{debug, error, info};

use crate::{
    config::{ServerConfig, SettingHost},
    middlewares::logging_route,
};

// 内容指纹缓存
pub mod cache;
pub mod error;
// 计算文件指纹
pub mod etag;
pub mod mime;
pub mod policy;
// 处理静态文件
pub mod serve;

pub use serve::StaticFiles;

/// Build the router serving `files`
///
/// Only GET, HEAD, POST and PUT reach the pipeline, other methods are
/// answered with 405 by the router.
pub fn router(files: StaticFiles, timeout: Duration) -> Router {
    let methods = MethodFilter::GET
        .or(MethodFilter::HEAD)
        .or(MethodFilter::POST)
        .or(MethodFilter::PUT);
    let handler = on(methods, serve::serve);

    let router = Router::new()
        .route("/", handler.clone())
        .route("/{*path}", handler)
        .with_state(files)
        .layer(ServiceBuilder::new().layer(TimeoutLayer::with_status_code(
            StatusCode::SERVICE_UNAVAILABLE,
            timeout,
        )));

    logging_route(router)
}

/// Build the pipeline for one configured host
pub fn static_files(host: &SettingHost) -> anyhow::Result<StaticFiles> {
    let config = ServerConfig::try_from(host)?;
    let cache_idle = config.cache_idle;
    let files = StaticFiles::new(config);
    files.mime().define(host.mime.clone());
    if let Some(max_idle) = cache_idle {
        cache::spawn_sweeper(files.cache(), max_idle);
    }
    Ok(files)
}

/// 启动所有服务器
///
/// Hosts that fail to start are logged and skipped.
pub async fn start_servers(hosts: Vec<SettingHost>) -> Vec<Handle<SocketAddr>> {
    let mut handles = Vec::new();
    for host in hosts {
        let server_addr = format!("{}:{}", host.ip, host.port);
        match make_server(host).await {
            Ok(handle) => {
                handles.push(handle);
                info!("Server instance started on {}", server_addr);
            }
            Err(e) => {
                error!(
                    "Failed to start server instance on {}: {:?}",
                    server_addr, e
                );
            }
        }
    }
    handles
}

/// 优雅关闭所有服务器
///
/// In-flight requests get 30 seconds to finish.
pub fn shutdown_servers(handles: &mut Vec<Handle<SocketAddr>>) {
    for handle in handles.iter() {
        handle.graceful_shutdown(Some(Duration::from_secs(30)));
    }
    handles.clear();
    info!("All servers have been signaled to shut down");
}

pub async fn make_server(host: SettingHost) -> anyhow::Result<Handle<SocketAddr>> {
    debug!("make_server start with host: {:?}", host);
    let files = static_files(&host)?;
    info!("Serving {:?}", files.config().root);
    let router = router(files, Duration::from_secs(host.timeout.into()));

    let addr = format!("{}:{}", host.ip, host.port);
    let addr: SocketAddr = addr.parse()?;

    let handle = Handle::new();
    let handle_clone = handle.clone();

    // 生成一个任务来运行服务器
    tokio::spawn(async move {
        info!("Listening on http://{}", addr);
        if let Err(e) = axum_server::bind(addr)
            .handle(handle_clone)
            .serve(router.into_make_service())
            .await
        {
            error!("Server on {} stopped: {:?}", addr, e);
        }
    });

    Ok(handle)
}
