//! Registry credential discovery.
//!
//! Credentials come from the docker CLI config (`DOCKER_CONFIG` or
//! `~/.docker/config.json`) when one exists for the registry domain, with a
//! GHCR token fallback from the environment. Discovery happens once at
//! resolver construction; this module only maps a domain to credentials.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use oci_distribution::secrets::RegistryAuth;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, trace};

/// Legacy key Docker Hub credentials are stored under.
const DOCKER_HUB_CONFIG_KEY: &str = "https://index.docker.io/v1/";

#[derive(Debug, Deserialize)]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, DockerAuthEntry>,
}

#[derive(Debug, Deserialize)]
struct DockerAuthEntry {
    auth: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

/// Pick credentials for `registry`.
pub(crate) fn auth_for(
    registry: &str,
    docker_config: Option<&Path>,
    github_token: Option<&str>,
) -> RegistryAuth {
    if let Some(path) = docker_config
        && let Some(auth) = docker_config_auth(path, registry)
    {
        debug!(%registry, config = %path.display(), "using docker config credentials");
        return auth;
    }

    if registry == "ghcr.io"
        && let Some(token) = github_token
    {
        debug!(%registry, "using GitHub token for ghcr.io");
        return RegistryAuth::Basic(String::new(), token.to_string());
    }

    trace!(%registry, "no credentials found; using anonymous access");
    RegistryAuth::Anonymous
}

fn docker_config_auth(path: &Path, registry: &str) -> Option<RegistryAuth> {
    let text = std::fs::read_to_string(path).ok()?;
    let config: DockerConfig = serde_json::from_str(&text).ok()?;

    let entry = config.auths.get(registry).or_else(|| {
        // Docker Hub credentials live under the legacy index URL.
        (registry == "docker.io")
            .then(|| config.auths.get(DOCKER_HUB_CONFIG_KEY))
            .flatten()
    })?;

    if let Some(encoded) = &entry.auth {
        let decoded = BASE64.decode(encoded).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, pass) = decoded.split_once(':')?;
        return Some(RegistryAuth::Basic(user.to_string(), pass.to_string()));
    }

    match (&entry.username, &entry.password) {
        (Some(user), Some(pass)) => Some(RegistryAuth::Basic(user.clone(), pass.clone())),
        _ => None,
    }
}
