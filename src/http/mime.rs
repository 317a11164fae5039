// https://developer.mozilla.org/en-US/docs/Web/HTTP/Basics_of_HTTP/MIME_types/Common_types
use dashmap::DashMap;
use serde::Deserialize;
use tracing::debug;

macro_rules! mime {
    ($a:ident, $b:literal) => {
        pub const $a: &str = $b;
    };
}

mime!(TEXT_PLAIN, "text/plain");
mime!(TEXT_HTML, "text/html");

/// One or many file extensions registered for a content type
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum Extensions {
    One(String),
    Many(Vec<String>),
}

impl Extensions {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let items: &[String] = match self {
            Extensions::One(ext) => std::slice::from_ref(ext),
            Extensions::Many(exts) => exts,
        };
        items.iter().map(String::as_str)
    }
}

impl From<&str> for Extensions {
    fn from(ext: &str) -> Self {
        Extensions::One(ext.to_string())
    }
}

impl From<String> for Extensions {
    fn from(ext: String) -> Self {
        Extensions::One(ext)
    }
}

impl From<Vec<String>> for Extensions {
    fn from(exts: Vec<String>) -> Self {
        Extensions::Many(exts)
    }
}

impl<const N: usize> From<[&str; N]> for Extensions {
    fn from(exts: [&str; N]) -> Self {
        Extensions::Many(exts.iter().map(|ext| ext.to_string()).collect())
    }
}

/// Extension to content type lookup
///
/// Overrides registered through `define` win, then the `mime_guess` table,
/// then `text/html`.
#[derive(Debug)]
pub struct ContentTypeRegistry {
    overrides: DashMap<String, String>,
    fallback: String,
}

impl Default for ContentTypeRegistry {
    fn default() -> Self {
        Self {
            overrides: DashMap::new(),
            fallback: TEXT_HTML.to_string(),
        }
    }
}

impl ContentTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the content type of an extension, the leading `.` is optional
    pub fn lookup(&self, ext: &str) -> String {
        let key = normalize(ext);
        if let Some(content_type) = self.overrides.get(&key) {
            return content_type.clone();
        }
        mime_guess::from_ext(&key[1..])
            .first_raw()
            .map(str::to_string)
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Register content types, each for one or many extensions
    pub fn define<C, E>(&self, mapping: impl IntoIterator<Item = (C, E)>)
    where
        C: AsRef<str>,
        E: Into<Extensions>,
    {
        for (content_type, extensions) in mapping {
            let content_type = content_type.as_ref();
            let extensions: Extensions = extensions.into();
            for ext in extensions.iter() {
                let key = normalize(ext);
                debug!("define content type {} for {}", content_type, key);
                self.overrides.insert(key, content_type.to_string());
            }
        }
    }
}

fn normalize(ext: &str) -> String {
    let ext = ext.trim().to_ascii_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}
