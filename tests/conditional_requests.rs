//! If-None-Match / If-Modified-Since 条件请求测试

use std::{
    fs,
    time::{Duration, SystemTime},
};

use anyhow::Result;
use axum::http::{Method, StatusCode};

use hashserve::{
    config::{Rehash, ServerConfig},
    http::{StaticFiles, policy::ModificationPolicy, serve::RequestContext},
    utils::{format_http_date, parse_http_date},
};

mod common;
use common::*;

#[tokio::test]
async fn test_first_get_returns_body_and_etag() -> Result<()> {
    let dir = create_fixtures()?;
    let router = test_router(default_files(&dir)?);

    let (status, headers, body) = get(&router, "/hello.txt").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], HELLO.as_bytes());
    assert_eq!(header(&headers, "etag"), HELLO_MD5);
    Ok(())
}

#[tokio::test]
async fn test_if_none_match_with_previous_etag() -> Result<()> {
    let dir = create_fixtures()?;
    let router = test_router(default_files(&dir)?);

    let (_, headers, _) = get(&router, "/index.html").await?;
    let etag = header(&headers, "etag").to_string();
    assert!(!etag.is_empty());

    let (status, headers, body) = send(
        &router,
        request(Method::GET, "/index.html", &[("if-none-match", &etag)]),
    )
    .await?;

    assert_eq!(status, StatusCode::NOT_MODIFIED);
    assert!(body.is_empty());
    // 304 leaves before any response header is generated
    assert!(headers.get("etag").is_none());
    Ok(())
}

#[tokio::test]
async fn test_if_none_match_on_uncached_file() -> Result<()> {
    let dir = create_fixtures()?;
    let files = default_files(&dir)?;
    let cache = files.cache().clone();
    let router = test_router(files);

    let (status, _, body) = send(
        &router,
        request(Method::GET, "/hello.txt", &[("if-none-match", HELLO_MD5)]),
    )
    .await?;

    assert_eq!(status, StatusCode::NOT_MODIFIED);
    assert!(body.is_empty());
    assert_eq!(cache.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_if_none_match_quoted_and_listed() -> Result<()> {
    let dir = create_fixtures()?;
    let router = test_router(default_files(&dir)?);

    let quoted = format!("\"abc\", W/\"{HELLO_MD5}\"");
    let (status, _, _) = send(
        &router,
        request(Method::GET, "/hello.txt", &[("if-none-match", &quoted)]),
    )
    .await?;

    assert_eq!(status, StatusCode::NOT_MODIFIED);
    Ok(())
}

#[tokio::test]
async fn test_if_none_match_mismatch_returns_full_body() -> Result<()> {
    let dir = create_fixtures()?;
    let router = test_router(default_files(&dir)?);

    let (status, headers, body) = send(
        &router,
        request(
            Method::GET,
            "/hello.txt",
            &[("if-none-match", "1111222233334444")],
        ),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], HELLO.as_bytes());
    assert_eq!(header(&headers, "etag"), HELLO_MD5);
    Ok(())
}

#[tokio::test]
async fn test_if_modified_since_after_mtime() -> Result<()> {
    let dir = create_fixtures()?;
    let router = test_router(default_files(&dir)?);

    let (_, headers, _) = get(&router, "/index.html").await?;
    let modified = parse_http_date(header(&headers, "last-modified")).expect("Invalid date");
    let one_day_later = format_http_date(SystemTime::from(modified) + Duration::from_secs(86400));

    let (status, _, body) = send(
        &router,
        request(
            Method::GET,
            "/index.html",
            &[("if-modified-since", &one_day_later)],
        ),
    )
    .await?;

    assert_eq!(status, StatusCode::NOT_MODIFIED);
    assert!(body.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_if_modified_since_equal_to_last_modified() -> Result<()> {
    let dir = create_fixtures()?;
    let router = test_router(default_files(&dir)?);

    let (_, headers, _) = get(&router, "/index.html").await?;
    let last_modified = header(&headers, "last-modified").to_string();

    let (status, _, _) = send(
        &router,
        request(
            Method::GET,
            "/index.html",
            &[("if-modified-since", &last_modified)],
        ),
    )
    .await?;

    assert_eq!(status, StatusCode::NOT_MODIFIED);
    Ok(())
}

#[tokio::test]
async fn test_if_modified_since_before_mtime() -> Result<()> {
    let dir = create_fixtures()?;
    let router = test_router(default_files(&dir)?);

    let (status, _, body) = send(
        &router,
        request(
            Method::GET,
            "/index.html",
            &[("if-modified-since", "Sun, 06 Nov 1994 08:49:37 GMT")],
        ),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], INDEX_HTML.as_bytes());
    Ok(())
}

#[tokio::test]
async fn test_if_modified_since_unparsable_is_ignored() -> Result<()> {
    let dir = create_fixtures()?;
    let router = test_router(default_files(&dir)?);

    let (status, _, body) = send(
        &router,
        request(
            Method::GET,
            "/index.html",
            &[("if-modified-since", "not a date")],
        ),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], INDEX_HTML.as_bytes());
    Ok(())
}

#[tokio::test]
async fn test_if_none_match_takes_precedence_over_if_modified_since() -> Result<()> {
    let dir = create_fixtures()?;
    let router = test_router(default_files(&dir)?);

    let (_, headers, _) = get(&router, "/index.html").await?;
    let modified = parse_http_date(header(&headers, "last-modified")).expect("Invalid date");
    let one_day_later = format_http_date(SystemTime::from(modified) + Duration::from_secs(86400));

    // If-Modified-Since alone would be a 304
    let (status, _, body) = send(
        &router,
        request(
            Method::GET,
            "/index.html",
            &[
                ("if-none-match", "1111222233334444"),
                ("if-modified-since", &one_day_later),
            ],
        ),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], INDEX_HTML.as_bytes());

    // If-None-Match alone matching is enough, a stale If-Modified-Since is ignored
    let etag = header(&headers, "etag").to_string();
    let (status, _, _) = send(
        &router,
        request(
            Method::GET,
            "/index.html",
            &[
                ("if-none-match", &etag),
                ("if-modified-since", "Sun, 06 Nov 1994 08:49:37 GMT"),
            ],
        ),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_MODIFIED);
    Ok(())
}

#[tokio::test]
async fn test_rewritten_file_gets_new_etag() -> Result<()> {
    let dir = create_fixtures()?;
    let files = StaticFiles::new(ServerConfig::new(dir.path())?.with_rehash(Rehash::OnChange));
    let router = test_router(files);

    let (_, headers, _) = get(&router, "/hello.txt").await?;
    let old_etag = header(&headers, "etag").to_string();
    assert_eq!(old_etag, HELLO_MD5);

    let path = dir.path().join("hello.txt");
    fs::write(&path, "hello again")?;
    let file = fs::File::options().write(true).open(&path)?;
    file.set_modified(SystemTime::now() + Duration::from_secs(60))?;
    drop(file);

    // the old tag must not produce a 304 any more
    let (status, headers, body) = send(
        &router,
        request(Method::GET, "/hello.txt", &[("if-none-match", &old_etag)]),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"hello again");
    assert_eq!(
        header(&headers, "etag"),
        format!("{:x}", md5::compute("hello again"))
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_gets_agree_on_etag() -> Result<()> {
    let dir = create_fixtures()?;
    let content: Vec<u8> = (0..512 * 1024).map(|i| (i % 251) as u8).collect();
    fs::write(dir.path().join("large.bin"), &content)?;
    let expected = format!("{:x}", md5::compute(&content));

    let router = test_router(default_files(&dir)?);
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let router = router.clone();
            tokio::spawn(async move { get(&router, "/large.bin").await })
        })
        .collect();

    for task in tasks {
        let (status, headers, body) = task.await??;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(header(&headers, "etag"), expected);
        assert_eq!(body.len(), content.len());
    }
    Ok(())
}

/// Deletes the file between stat and hashing
struct RemoveBeforeHash;

impl ModificationPolicy for RemoveBeforeHash {
    fn body_modified(&self, ctx: &RequestContext) -> bool {
        let _ = fs::remove_file(&ctx.absolute_path);
        true
    }
}

#[tokio::test]
async fn test_failed_hash_is_internal_error() -> Result<()> {
    let dir = create_fixtures()?;
    let files = default_files(&dir)?.with_policy(RemoveBeforeHash);
    let cache = files.cache().clone();
    let router = test_router(files);

    let (status, headers, body) = get(&router, "/hello.txt").await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&body[..], b"Internal Server Error");
    assert!(headers.get("etag").is_none());
    assert_eq!(cache.len(), 0);
    Ok(())
}

// stat succeeds on /proc/self/mem but reading offset 0 fails with EIO
#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_if_none_match_with_unreadable_file() -> Result<()> {
    let dir = create_fixtures()?;
    std::os::unix::fs::symlink("/proc/self/mem", dir.path().join("unreadable.bin"))?;
    let files = default_files(&dir)?;
    let cache = files.cache().clone();
    let router = test_router(files);

    let (status, _, body) = send(
        &router,
        request(Method::GET, "/unreadable.bin", &[("if-none-match", HELLO_MD5)]),
    )
    .await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&body[..], b"Internal Server Error");
    assert_eq!(cache.len(), 0);
    Ok(())
}
