//! Upstream payload shape.

use serde::{Deserialize, Serialize};

/// One repository record from the upstream listing.
///
/// The upstream returns a JSON array of these. Decoding is strict about the
/// fields below; anything that does not match fails the whole relay closed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    pub description: Option<String>,
    pub fork: bool,
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
}
