//! Migration parameters
//!
//! [`RequestParams`] is the loosely-typed wire form read from JSON.
//! [`MigrationRequest`] is the validated form the orchestrator runs,
//! with required fields guaranteed present and defaults applied.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Deserializer};

use crate::config::parse_bool;
use crate::{Error, Result};

/// Sentinel value for "no subdirectory"
pub const NO_SUB_DIR: &str = "false";

/// Branch the migrated commit lands on when none is given
pub const DEFAULT_BRANCH: &str = "main";

/// Parameters as received from the caller
///
/// Every field is optional here; [`MigrationRequest::try_from`] decides
/// what is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestParams {
    /// Local working directory, recreated on every run
    pub repo_dir: Option<String>,

    /// Repository to migrate from
    pub source_url: Option<String>,

    /// Repository to migrate to
    pub destination_url: Option<String>,

    /// Branch to check out from the source
    pub branch: Option<String>,

    /// Legacy name for `source_url`
    pub src_clone_url: Option<String>,

    /// Legacy name for `destination_url`
    pub dest_clone_url: Option<String>,

    /// Legacy name for `branch`
    pub repo_branch: Option<String>,

    /// Subdirectory to promote to the new root, or `"false"`
    pub sub_dir: Option<String>,

    /// Branch name to push as
    pub default_branch: Option<String>,

    #[serde(default, deserialize_with = "loose_bool")]
    pub use_ssh_source: Option<bool>,

    #[serde(default, deserialize_with = "loose_bool")]
    pub use_ssh_destination: Option<bool>,

    /// Override for the pre-push sync step
    #[serde(default, deserialize_with = "loose_bool")]
    pub sync_before_push: Option<bool>,
}

/// Accept `true`, `"true"`, `"TRUE"`, ... and the same for false
fn loose_bool<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Bool(bool),
        Text(String),
    }

    match Option::<Loose>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Loose::Bool(b)) => Ok(Some(b)),
        Some(Loose::Text(s)) => parse_bool(&s).map(Some).ok_or_else(|| {
            <D::Error as serde::de::Error>::custom(format!("expected \"true\" or \"false\", got \"{}\"", s))
        }),
    }
}

/// A validated migration request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRequest {
    pub repo_dir: PathBuf,
    pub source_url: String,
    pub destination_url: String,
    pub branch: String,
    /// Relative path inside the clone to promote, if any
    pub sub_dir: Option<PathBuf>,
    pub default_branch: String,
    pub use_ssh_source: bool,
    pub use_ssh_destination: bool,
    /// `None` defers to the configured default
    pub sync_before_push: Option<bool>,
}

impl RequestParams {
    /// Parse a JSON parameter object without validating it
    pub fn from_json(input: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(input).map_err(|e| Error::InputParse(e.to_string()))?;

        if !value.is_object() {
            return Err(Error::InputParse(
                "parameters must be a JSON object".to_string(),
            ));
        }

        serde_json::from_value(value).map_err(|e| Error::InputParse(e.to_string()))
    }

    /// Fold the legacy field names into the current ones
    ///
    /// A non-empty current name wins over its legacy counterpart.
    fn merge_legacy(mut self) -> Self {
        fn prefer(current: &mut Option<String>, legacy: Option<String>) {
            if non_empty(current.as_deref()).is_none() && legacy.is_some() {
                *current = legacy;
            }
        }

        prefer(&mut self.source_url, self.src_clone_url.take());
        prefer(&mut self.destination_url, self.dest_clone_url.take());
        prefer(&mut self.branch, self.repo_branch.take());
        self
    }
}

impl TryFrom<RequestParams> for MigrationRequest {
    type Error = Error;

    fn try_from(params: RequestParams) -> Result<Self> {
        let params = params.merge_legacy();
        let required = [
            ("repo_dir", &params.repo_dir),
            ("source_url", &params.source_url),
            ("destination_url", &params.destination_url),
            ("branch", &params.branch),
        ];

        let missing: Vec<String> = required
            .iter()
            .filter(|(_, value)| non_empty(value.as_deref()).is_none())
            .map(|(name, _)| name.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(Error::Validation { missing });
        }

        for (name, value) in [("branch", &params.branch), ("default_branch", &params.default_branch)] {
            if let Some(value) = non_empty(value.as_deref()) {
                if value.starts_with('-') {
                    return Err(Error::InvalidParameter {
                        name: name.to_string(),
                        reason: format!("'{}' is not a valid branch name", value),
                    });
                }
            }
        }

        let sub_dir = match params.sub_dir.as_deref() {
            Some(raw) => normalize_sub_dir(raw)?,
            None => None,
        };

        let default_branch = non_empty(params.default_branch.as_deref())
            .unwrap_or(DEFAULT_BRANCH)
            .to_string();

        // Checked above
        let take = |v: Option<String>| v.unwrap_or_default().trim().to_string();

        Ok(Self {
            repo_dir: PathBuf::from(take(params.repo_dir)),
            source_url: take(params.source_url),
            destination_url: take(params.destination_url),
            branch: take(params.branch),
            sub_dir,
            default_branch,
            use_ssh_source: params.use_ssh_source.unwrap_or(true),
            use_ssh_destination: params.use_ssh_destination.unwrap_or(true),
            sync_before_push: params.sync_before_push,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Turn a raw `sub_dir` into a clean relative path
///
/// The sentinel, empty strings and paths that name the root itself
/// mean "no subdirectory". Paths that could leave the clone are rejected.
fn normalize_sub_dir(raw: &str) -> Result<Option<PathBuf>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == NO_SUB_DIR {
        return Ok(None);
    }

    let mut clean = PathBuf::new();
    for component in Path::new(raw).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::InvalidParameter {
                    name: "sub_dir".to_string(),
                    reason: format!("'{}' must be a relative path inside the repository", raw),
                });
            }
        }
    }

    if clean.as_os_str().is_empty() {
        Ok(None)
    } else {
        Ok(Some(clean))
    }
}
