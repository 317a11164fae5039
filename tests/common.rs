//! 集成测试的公共辅助函数和工具
#![allow(dead_code)]

use std::{fs, net::SocketAddr, time::Duration};

use anyhow::Result;
use axum::{
    Router,
    body::{Body, Bytes, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode},
};
use tempfile::TempDir;
use tower::ServiceExt;

use hashserve::{
    config::{ServerConfig, Settings},
    http::{self, StaticFiles},
};

pub const INDEX_HTML: &str = "<html><body>Test Page</body></html>";
pub const HELLO: &str = "hello world";
pub const HELLO_MD5: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";

/// Fixture tree
///
/// ```text
/// index.html
/// hello.txt
/// font.woff
/// there/index.html
/// ```
pub fn create_fixtures() -> Result<TempDir> {
    let temp_dir = TempDir::new()?;
    fs::write(temp_dir.path().join("index.html"), INDEX_HTML)?;
    fs::write(temp_dir.path().join("hello.txt"), HELLO)?;
    fs::write(temp_dir.path().join("font.woff"), [0u8, 1, 2, 3])?;
    fs::create_dir(temp_dir.path().join("there"))?;
    fs::write(temp_dir.path().join("there").join("index.html"), INDEX_HTML)?;
    Ok(temp_dir)
}

pub fn default_files(dir: &TempDir) -> Result<StaticFiles> {
    Ok(StaticFiles::new(ServerConfig::new(dir.path())?))
}

pub fn test_router(files: StaticFiles) -> Router {
    http::router(files, Duration::from_secs(75))
}

pub fn request(method: Method, uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).expect("Invalid request")
}

/// 发送请求到路由，返回状态码、响应头和完整响应体
pub async fn send(router: &Router, request: Request<Body>) -> Result<(StatusCode, HeaderMap, Bytes)> {
    let response = router.clone().oneshot(request).await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, headers, body))
}

pub async fn get(router: &Router, uri: &str) -> Result<(StatusCode, HeaderMap, Bytes)> {
    send(router, request(Method::GET, uri, &[])).await
}

pub fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// 启动测试服务器，端口由系统分配
pub async fn start_test_server(
    dir: &TempDir,
    extra: &str,
) -> Result<(axum_server::Handle<SocketAddr>, SocketAddr)> {
    let config = format!(
        "[[host]]\nip = \"127.0.0.1\"\nport = 0\nroot = {:?}\n{}",
        dir.path().to_string_lossy(),
        extra
    );
    let settings = Settings::parse(&config)?;
    let host = settings.host.into_iter().next().expect("No host config");
    let handle = http::make_server(host).await?;
    let addr = handle.listening().await.expect("Server not listening");
    Ok((handle, addr))
}
