mod builtin;

pub use builtin::BUILTIN;

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        };
        write!(f, "{}", s)
    }
}

impl HttpMethod {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
            HttpMethod::Trace => reqwest::Method::from_bytes(b"TRACE").expect("valid method"),
        }
    }
}

/// Technique category, part of the export contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Header,
    Encoding,
    Protocol,
    Injection,
    BusinessLogic,
    Reconnaissance,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Header => "header",
            Category::Encoding => "encoding",
            Category::Protocol => "protocol",
            Category::Injection => "injection",
            Category::BusinessLogic => "business-logic",
            Category::Reconnaissance => "reconnaissance",
        };
        write!(f, "{}", s)
    }
}

impl Category {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "header" => Some(Category::Header),
            "encoding" => Some(Category::Encoding),
            "protocol" => Some(Category::Protocol),
            "injection" => Some(Category::Injection),
            "business-logic" | "business_logic" => Some(Category::BusinessLogic),
            "reconnaissance" | "recon" => Some(Category::Reconnaissance),
            _ => None,
        }
    }
}

/// A request before dispatch: the base profile probe, or a technique variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RequestSpec {
    pub fn base() -> Self {
        Self {
            method: HttpMethod::Get,
            path: "/".to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::base()
        }
    }
}

/// Declarative request mutation. `{host}` and `{token}` in values are
/// substituted at apply time, so descriptors stay `'static` data.
#[derive(Debug, Clone, Copy)]
pub enum Mutation {
    SetHeader(&'static str, &'static str),
    SetMethod(HttpMethod),
    SetPath(&'static str),
    SetBody(&'static str, &'static str),
    InjectQueryMarker,
}

/// Advisory hint for the evaluator: what a successful variant should leave
/// behind in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    None,
    ReflectedToken,
    EchoedHeader(&'static str),
    TimingAnomaly,
}

/// One bypass technique descriptor. Pure data: adding a technique is adding
/// a row to [`BUILTIN`], not a new code path.
#[derive(Debug)]
pub struct Technique {
    pub id: &'static str,
    pub name: &'static str,
    pub category: Category,
    pub mutations: &'static [Mutation],
    pub signal: Signal,
}

/// Runtime values substituted into `'static` mutation templates.
pub struct ApplyContext<'a> {
    pub host: &'a str,
    pub token: &'a str,
}

impl Technique {
    /// Transform the base request into this technique's variant.
    pub fn apply(&self, base: &RequestSpec, ctx: &ApplyContext<'_>) -> RequestSpec {
        let mut spec = base.clone();
        for mutation in self.mutations {
            match mutation {
                Mutation::SetHeader(name, value) => {
                    spec.headers
                        .push((name.to_string(), substitute(value, ctx)));
                }
                Mutation::SetMethod(method) => spec.method = *method,
                Mutation::SetPath(path) => spec.path = substitute(path, ctx),
                Mutation::SetBody(content_type, body) => {
                    spec.headers
                        .push(("Content-Type".to_string(), content_type.to_string()));
                    spec.body = Some(body.to_string());
                }
                Mutation::InjectQueryMarker => {
                    let sep = if spec.path.contains('?') { '&' } else { '?' };
                    spec.path = format!(
                        "{}{}probe={}",
                        spec.path,
                        sep,
                        urlencoding::encode(ctx.token)
                    );
                }
            }
        }
        spec
    }
}

fn substitute(template: &str, ctx: &ApplyContext<'_>) -> String {
    template
        .replace("{host}", ctx.host)
        .replace("{token}", ctx.token)
}

/// Read-only registry of technique descriptors, loaded once per process.
#[derive(Debug)]
pub struct TechniqueCatalog {
    techniques: Vec<&'static Technique>,
}

impl TechniqueCatalog {
    pub fn load() -> Self {
        Self {
            techniques: BUILTIN.iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.techniques.len()
    }

    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty()
    }

    pub fn all(&self) -> &[&'static Technique] {
        &self.techniques
    }

    /// Techniques restricted to the given categories; `None` means all.
    pub fn filtered(&self, categories: Option<&[Category]>) -> Vec<&'static Technique> {
        match categories {
            None => self.techniques.clone(),
            Some(cats) => self
                .techniques
                .iter()
                .copied()
                .filter(|t| cats.contains(&t.category))
                .collect(),
        }
    }

    /// Stable reorder putting preferred categories first. Prioritization
    /// only affects scheduling order, never which techniques run.
    pub fn prioritized(
        &self,
        categories: Option<&[Category]>,
        preferred: &[Category],
    ) -> Vec<&'static Technique> {
        let mut selected = self.filtered(categories);
        selected.sort_by_key(|t| {
            preferred
                .iter()
                .position(|c| *c == t.category)
                .unwrap_or(preferred.len())
        });
        selected
    }
}
