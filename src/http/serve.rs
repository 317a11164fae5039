use std::{
    io,
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use axum::{
    body::Body,
    extract::{Request, State},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use http::{
    HeaderMap, HeaderValue, Method, StatusCode,
    header::{
        CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
        LOCATION, SERVER,
    },
    request::Parts,
};
use percent_encoding::percent_decode_str;
use tokio::fs::{self, File};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, trace};

use crate::{
    config::ServerConfig,
    http::{
        cache::ContentHashCache,
        error::{CompletionHandler, ServeError, Terminal},
        etag,
        mime::ContentTypeRegistry,
        policy::ModificationPolicy,
    },
    utils::{format_http_date, parse_http_date, unix_seconds},
};

/// Request pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Decode the request path and join it to the root
    Resolve,
    /// Read file metadata
    Stat,
    /// `If-None-Match` and `If-Modified-Since`
    Negotiate,
    /// Ask the modification policy whether the body changed
    MarkBody,
    /// `ETag`, directory redirect and the static headers
    Headers,
    /// Open the file or settle on an empty body
    Body,
}

impl Stage {
    pub fn next(self) -> Option<Stage> {
        use Stage::*;

        match self {
            Resolve => Some(Stat),
            Stat => Some(Negotiate),
            Negotiate => Some(MarkBody),
            MarkBody => Some(Headers),
            Headers => Some(Body),
            Body => None,
        }
    }
}

/// State of one request while it moves through the pipeline
pub struct RequestContext {
    /// Request path as received, still percent encoded
    pub raw_path: String,
    pub absolute_path: PathBuf,
    /// Extension with its leading `.`, empty when there is none
    pub extension: String,
    pub is_directory: bool,
    pub last_modified: SystemTime,
    pub body_modified: bool,
    pub response_headers: HeaderMap,
    /// Opened before headers leave so open failures still get a status
    file: Option<File>,
}

impl RequestContext {
    pub fn new(raw_path: &str) -> Self {
        Self {
            raw_path: raw_path.to_string(),
            absolute_path: PathBuf::new(),
            extension: String::new(),
            is_directory: false,
            last_modified: SystemTime::UNIX_EPOCH,
            body_modified: false,
            response_headers: HeaderMap::new(),
            file: None,
        }
    }

    fn fail(&mut self, error: ServeError) -> Terminal {
        Terminal {
            error,
            headers: std::mem::take(&mut self.response_headers),
        }
    }
}

impl IntoResponse for RequestContext {
    fn into_response(self) -> Response {
        let body = match self.file {
            Some(file) => {
                let path = self.absolute_path;
                let stream = ReaderStream::new(file)
                    .inspect_err(move |err| error!("Failed to stream file {:?}: {}", path, err));
                Body::from_stream(stream)
            }
            None => Body::empty(),
        };
        (StatusCode::OK, self.response_headers, body).into_response()
    }
}

/// Serves a directory with content hash `ETag`s and conditional requests
///
/// Cheap to clone, all shared parts live behind `Arc`.
#[derive(Clone)]
pub struct StaticFiles {
    config: Arc<ServerConfig>,
    cache: Arc<ContentHashCache>,
    mime: Arc<ContentTypeRegistry>,
    policy: Arc<dyn ModificationPolicy>,
    completion: Option<CompletionHandler>,
}

impl StaticFiles {
    pub fn new(config: ServerConfig) -> Self {
        let cache = Arc::new(ContentHashCache::new(config.cache_capacity));
        let policy = config.rehash.policy();
        Self {
            config: Arc::new(config),
            cache,
            mime: Arc::new(ContentTypeRegistry::new()),
            policy,
            completion: None,
        }
    }

    /// Share a fingerprint cache between servers
    pub fn with_cache(mut self, cache: Arc<ContentHashCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_mime(mut self, mime: Arc<ContentTypeRegistry>) -> Self {
        self.mime = mime;
        self
    }

    pub fn with_policy(mut self, policy: impl ModificationPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Take over terminal responses (400, 404, 500, 301, 304) from the
    /// default fixed-message writer
    pub fn with_completion(
        mut self,
        handler: impl Fn(Terminal) -> Response + Send + Sync + 'static,
    ) -> Self {
        self.completion = Some(Arc::new(handler));
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ContentHashCache> {
        &self.cache
    }

    pub fn mime(&self) -> &ContentTypeRegistry {
        &self.mime
    }

    /// Run the pipeline for one request
    pub async fn serve(&self, request: Request) -> Response {
        let (parts, _body) = request.into_parts();
        let mut ctx = RequestContext::new(parts.uri.path());

        let mut stage = Some(Stage::Resolve);
        while let Some(current) = stage {
            trace!("{:?} {}", current, ctx.raw_path);
            if let Err(err) = self.run_stage(current, &mut ctx, &parts).await {
                let terminal = ctx.fail(err);
                return self.complete(terminal);
            }
            stage = current.next();
        }
        ctx.into_response()
    }

    async fn run_stage(
        &self,
        stage: Stage,
        ctx: &mut RequestContext,
        parts: &Parts,
    ) -> Result<(), ServeError> {
        match stage {
            Stage::Resolve => self.resolve(ctx),
            Stage::Stat => stat(ctx).await,
            Stage::Negotiate => self.negotiate(ctx, &parts.headers).await,
            Stage::MarkBody => {
                ctx.body_modified = self.policy.body_modified(ctx);
                Ok(())
            }
            Stage::Headers => self.generate_headers(ctx).await,
            Stage::Body => emit_body(ctx, &parts.method).await,
        }
    }

    fn resolve(&self, ctx: &mut RequestContext) -> Result<(), ServeError> {
        let decoded = decode_path(&ctx.raw_path)?;
        let relative =
            relative_path(&decoded).ok_or_else(|| ServeError::NotFound(PathBuf::from(&decoded)))?;
        ctx.extension = relative
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        ctx.absolute_path = self.config.root.join(relative);
        debug!("resolve {} to {:?}", ctx.raw_path, ctx.absolute_path);
        Ok(())
    }

    async fn negotiate(&self, ctx: &RequestContext, headers: &HeaderMap) -> Result<(), ServeError> {
        if ctx.is_directory {
            return Ok(());
        }

        // a present If-None-Match makes If-Modified-Since irrelevant
        if let Some(if_none_match) = headers.get(IF_NONE_MATCH) {
            let client = if_none_match.to_str().unwrap_or_default();
            let fingerprint = match self.cache.get(&ctx.absolute_path, ctx.last_modified) {
                Some(cached) => cached,
                None => self.fingerprint(ctx).await?,
            };
            if etag::matches(client, &fingerprint) {
                debug!("If-None-Match {} matches {:?}", client, ctx.absolute_path);
                return Err(ServeError::NotModified);
            }
            return Ok(());
        }

        let since = headers
            .get(IF_MODIFIED_SINCE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_http_date);
        if let Some(since) = since
            && unix_seconds(ctx.last_modified) <= since.timestamp()
        {
            debug!("If-Modified-Since {} for {:?}", since, ctx.absolute_path);
            return Err(ServeError::NotModified);
        }
        Ok(())
    }

    async fn generate_headers(&self, ctx: &mut RequestContext) -> Result<(), ServeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&self.mime.lookup(&ctx.extension))?,
        );
        headers.insert(
            LAST_MODIFIED,
            HeaderValue::from_str(&format_http_date(ctx.last_modified))?,
        );
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_str(&format!("max-age={}", self.config.cache_seconds))?,
        );
        headers.insert(SERVER, HeaderValue::from_str(&self.config.server_info)?);
        for (name, value) in &self.config.extra_headers {
            headers.insert(name.clone(), value.clone());
        }
        ctx.response_headers = headers;

        if !ctx.is_directory {
            let fingerprint = if ctx.body_modified {
                self.fingerprint(ctx).await?
            } else {
                match self.cache.get(&ctx.absolute_path, ctx.last_modified) {
                    Some(cached) => cached,
                    None => self.fingerprint(ctx).await?,
                }
            };
            ctx.response_headers
                .insert(ETAG, HeaderValue::from_str(&fingerprint)?);
            return Ok(());
        }

        let raw_path = ctx.raw_path.trim();
        if !raw_path.ends_with('/') {
            let location = format!("{raw_path}/");
            ctx.response_headers
                .insert(LOCATION, HeaderValue::from_str(&location)?);
            return Err(ServeError::Redirect(location));
        }
        Ok(())
    }

    /// Hash the file and remember the result for its current modification time
    async fn fingerprint(&self, ctx: &RequestContext) -> Result<String, ServeError> {
        let fingerprint = etag::compute(&ctx.absolute_path).await?;
        self.cache.set(
            ctx.absolute_path.clone(),
            ctx.last_modified,
            fingerprint.clone(),
        );
        Ok(fingerprint)
    }

    fn complete(&self, terminal: Terminal) -> Response {
        let status = terminal.status();
        if status.is_server_error() {
            error!("{} {}", status, terminal.error);
        } else {
            debug!("{} {}", status, terminal.error);
        }
        match &self.completion {
            Some(handler) => handler(terminal),
            None => terminal.into_response(),
        }
    }
}

async fn stat(ctx: &mut RequestContext) -> Result<(), ServeError> {
    let metadata = fs::metadata(&ctx.absolute_path)
        .await
        .map_err(|err| ServeError::from_io(err, &ctx.absolute_path))?;
    ctx.is_directory = metadata.is_dir();
    ctx.last_modified = metadata.modified()?;
    Ok(())
}

/// Read errors after the file is open abort the connection, the status line
/// is already gone by then.
async fn emit_body(ctx: &mut RequestContext, method: &Method) -> Result<(), ServeError> {
    let has_body = method == Method::GET || method == Method::POST || method == Method::PUT;
    if !has_body {
        if method != Method::HEAD {
            debug!("no body emission for method {}", method);
        }
        return Ok(());
    }
    if ctx.is_directory {
        return Ok(());
    }

    match File::open(&ctx.absolute_path).await {
        Ok(file) => {
            ctx.file = Some(file);
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::IsADirectory => Ok(()),
        Err(err) => Err(ServeError::from_io(err, &ctx.absolute_path)),
    }
}

/// Percent-decode a request path
///
/// Every `%` must start a two digit hex escape and the decoded bytes must be
/// UTF-8.
pub fn decode_path(raw: &str) -> Result<String, ServeError> {
    let well_formed = raw.split('%').skip(1).all(|segment| {
        segment
            .as_bytes()
            .get(..2)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
    });
    if !well_formed {
        return Err(ServeError::MalformedRequest(raw.to_string()));
    }
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ServeError::MalformedRequest(raw.to_string()))
}

/// Turn a decoded request path into a path relative to the root
///
/// Returns `None` for anything that would climb out of the root.
pub fn relative_path(decoded: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(decoded).components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(part) => relative.push(part),
            Component::ParentDir | Component::Prefix(_) => return None,
        }
    }
    Some(relative)
}

/// axum handler for every static route
pub async fn serve(State(files): State<StaticFiles>, request: Request) -> Response {
    files.serve(request).await
}
