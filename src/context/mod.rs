//! Per-request context handed to route handlers.
//!
//! A [`Context`] owns the parsed [`Request`] together with the path parameters
//! captured by the route pattern that matched it.

use std::collections::HashMap;

use crate::Request;

/// Path parameters extracted from the matched route, e.g. `collection` and
/// `id` for `/api/data/{collection}/{id}`.
#[derive(Default, Debug, Clone)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    /// Create a new empty parameters map
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Insert a value into the parameters map
    pub fn insert(&mut self, key: String, value: String) {
        self.map.insert(key, value);
    }

    /// Get a value from the parameters map
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|value| value.as_str())
    }
}

/// The request being served plus its route captures.
pub struct Context {
    request: Request,
    params: PathParams,
}

impl Context {
    pub fn with_params(request: Request, params: PathParams) -> Self {
        Self { request, params }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Shorthand for a captured path parameter, empty if absent.
    pub fn param(&self, key: &str) -> &str {
        self.params.get(key).unwrap_or("")
    }

    /// Deserializes the request body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }
}
