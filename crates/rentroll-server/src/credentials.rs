// SPDX-License-Identifier: Apache-2.0

//! Service-account key provisioning. The key arrives either as a file path
//! (`GOOGLE_APPLICATION_CREDENTIALS`) or base64-encoded key material
//! (`GOOGLE_CREDENTIALS_BASE64`); both must behave identically. The path
//! form wins when both are set.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const CREDENTIALS_PATH_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const CREDENTIALS_BASE64_VAR: &str = "GOOGLE_CREDENTIALS_BASE64";

const MATERIALIZED_FILE_NAME: &str = "gcp-credentials.json";

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("credential file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("credential payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("credential payload is not a JSON object")]
    NotJsonObject,
    #[error("credential write failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    File,
    Base64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSetup {
    pub path: PathBuf,
    pub source: CredentialSource,
}

/// Resolve credentials from explicit inputs. `dir` is where base64 material
/// gets materialized. Returns `None` when neither form is supplied.
pub fn provision_from(
    path_var: Option<&str>,
    base64_var: Option<&str>,
    dir: &Path,
) -> Result<Option<CredentialSetup>, CredentialsError> {
    if let Some(path) = path_var.map(str::trim).filter(|p| !p.is_empty()) {
        let path = PathBuf::from(path);
        if !path.is_file() {
            return Err(CredentialsError::FileNotFound(path));
        }
        return Ok(Some(CredentialSetup {
            path,
            source: CredentialSource::File,
        }));
    }

    let Some(encoded) = base64_var.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    let bytes = BASE64.decode(encoded.as_bytes())?;
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|_| CredentialsError::NotJsonObject)?;
    if !value.is_object() {
        return Err(CredentialsError::NotJsonObject);
    }

    let path = dir.join(MATERIALIZED_FILE_NAME);
    std::fs::write(&path, &bytes)?;
    Ok(Some(CredentialSetup {
        path,
        source: CredentialSource::Base64,
    }))
}

/// Resolve from the process environment and, when base64 material was
/// materialized, point `GOOGLE_APPLICATION_CREDENTIALS` at the written file
/// so downstream tooling sees the usual variable.
pub fn provision(dir: &Path) -> Result<Option<CredentialSetup>, CredentialsError> {
    let setup = provision_from(
        std::env::var(CREDENTIALS_PATH_VAR).ok().as_deref(),
        std::env::var(CREDENTIALS_BASE64_VAR).ok().as_deref(),
        dir,
    )?;
    if let Some(setup) = &setup {
        if setup.source == CredentialSource::Base64 {
            std::env::set_var(CREDENTIALS_PATH_VAR, &setup.path);
        }
        info!(path = %setup.path.display(), source = ?setup.source, "warehouse credentials resolved");
    }
    Ok(setup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const KEY_JSON: &str = r#"{"type":"service_account","project_id":"rentroll-ai"}"#;

    #[test]
    fn path_form_is_used_directly() {
        let dir = TempDir::new().expect("tempdir");
        let key_path = dir.path().join("key.json");
        std::fs::write(&key_path, KEY_JSON).expect("write key");

        let setup = provision_from(key_path.to_str(), None, dir.path())
            .expect("provision")
            .expect("some");
        assert_eq!(setup.source, CredentialSource::File);
        assert_eq!(setup.path, key_path);
    }

    #[test]
    fn base64_form_materializes_identical_content() {
        let dir = TempDir::new().expect("tempdir");
        let encoded = BASE64.encode(KEY_JSON);

        let setup = provision_from(None, Some(&encoded), dir.path())
            .expect("provision")
            .expect("some");
        assert_eq!(setup.source, CredentialSource::Base64);
        let written = std::fs::read_to_string(&setup.path).expect("read");
        assert_eq!(written, KEY_JSON);
    }

    #[test]
    fn path_wins_over_base64() {
        let dir = TempDir::new().expect("tempdir");
        let key_path = dir.path().join("key.json");
        std::fs::write(&key_path, KEY_JSON).expect("write key");
        let encoded = BASE64.encode(r#"{"type":"other"}"#);

        let setup = provision_from(key_path.to_str(), Some(&encoded), dir.path())
            .expect("provision")
            .expect("some");
        assert_eq!(setup.source, CredentialSource::File);
    }

    #[test]
    fn rejects_bad_material() {
        let dir = TempDir::new().expect("tempdir");

        assert!(matches!(
            provision_from(Some("/nonexistent/key.json"), None, dir.path()),
            Err(CredentialsError::FileNotFound(_))
        ));
        assert!(matches!(
            provision_from(None, Some("%%%not-base64%%%"), dir.path()),
            Err(CredentialsError::InvalidBase64(_))
        ));
        let encoded = BASE64.encode("[1,2,3]");
        assert!(matches!(
            provision_from(None, Some(&encoded), dir.path()),
            Err(CredentialsError::NotJsonObject)
        ));
    }

    #[test]
    fn absent_inputs_yield_none() {
        let dir = TempDir::new().expect("tempdir");
        assert_eq!(provision_from(None, Some("  "), dir.path()).expect("ok"), None);
    }
}
