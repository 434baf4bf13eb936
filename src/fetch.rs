use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{Result, WizardError};

/// Moves a remote resource to a local path.
pub trait Transport {
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Download `source_url` into `dir` and verify it against the manifest at `manifest_url`.
///
/// The artifact is only handed back once the SHA-256 digest listed for its
/// exact file name matches the bytes on disk. There is no fallback when the
/// manifest is missing.
pub fn fetch_verified<T: Transport + ?Sized>(
    transport: &T,
    source_url: &str,
    manifest_url: &str,
    dir: &Path,
) -> Result<PathBuf> {
    let file = file_name_from_url(source_url)?;
    let dest = dir.join(&file);

    info!("Downloading {} to {:?}", source_url, dest);
    transport.download(source_url, &dest)?;

    let scratch = Scratch(dir.join(format!(".{file}.sums")));
    let manifest = transport
        .download(manifest_url, &scratch.0)
        .and_then(|_| Ok(fs::read_to_string(&scratch.0)?))
        .map_err(|e| WizardError::ManifestUnavailable {
            url: manifest_url.to_string(),
            reason: e.to_string(),
        })?;

    let expected = expected_digest(&manifest, &file)
        .ok_or_else(|| WizardError::ChecksumMissing { file: file.clone() })?;
    let actual = sha256_file(&dest)?;

    if !actual.eq_ignore_ascii_case(&expected) {
        warn!("Checksum mismatch for {}: expected {}, got {}", file, expected, actual);
        if let Err(e) = fs::remove_file(&dest) {
            warn!("Failed to remove unverified {:?}: {}", dest, e);
        }
        return Err(WizardError::ChecksumMismatch {
            file,
            expected: expected.to_ascii_lowercase(),
            actual,
        });
    }

    info!("Verified {} (sha256 {})", file, actual);
    Ok(dest)
}

/// Final path segment of a URL, ignoring query and fragment.
pub fn file_name_from_url(url: &str) -> Result<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = path.split_once("://").map_or(path, |(_, rest)| rest);
    match path.trim_end_matches('/').rsplit_once('/') {
        Some((_, name)) if !name.is_empty() && name != "." && name != ".." => Ok(name.to_string()),
        _ => Err(WizardError::Environment(format!(
            "cannot derive a file name from {url}"
        ))),
    }
}

/// Split a `sha256sum`-style line into (digest, file name).
pub fn parse_manifest_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (digest, rest) = line.split_once(char::is_whitespace)?;
    if digest.is_empty() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    // Binary-mode entries prefix the name with '*'
    let name = rest.trim_start();
    let name = name.strip_prefix('*').unwrap_or(name);
    Some((digest, name))
}

/// Digest recorded for exactly `file`, if any.
pub fn expected_digest(manifest: &str, file: &str) -> Option<String> {
    manifest
        .lines()
        .filter_map(parse_manifest_line)
        .find(|(_, name)| *name == file)
        .map(|(digest, _)| digest.to_string())
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut r = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Removes the manifest scratch file on every exit path.
struct Scratch(PathBuf);

impl Drop for Scratch {
    fn drop(&mut self) {
        if self.0.exists() {
            debug!("Removing {:?}", self.0);
            let _ = fs::remove_file(&self.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Serves fixed bodies by URL; unknown URLs fail like `curl -f` on a 404.
    #[derive(Default)]
    struct FakeTransport {
        bodies: HashMap<String, Vec<u8>>,
        requested: RefCell<Vec<String>>,
    }

    impl FakeTransport {
        fn serve(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
            self.bodies.insert(url.to_string(), body.into());
            self
        }
    }

    impl Transport for FakeTransport {
        fn download(&self, url: &str, dest: &Path) -> Result<()> {
            self.requested.borrow_mut().push(url.to_string());
            match self.bodies.get(url) {
                Some(body) => Ok(fs::write(dest, body)?),
                None => Err(WizardError::ExternalTool {
                    tool: "curl".to_string(),
                    code: Some(22),
                }),
            }
        }
    }

    const ARTIFACT: &str = "https://example.org/pub/linux-6.1.tar.xz";
    const MANIFEST: &str = "https://example.org/pub/sha256sums.asc";
    const BODY: &[u8] = b"not really a kernel";

    fn digest_of(body: &[u8]) -> String {
        format!("{:x}", Sha256::digest(body))
    }

    #[test]
    fn verified_fetch_returns_matching_file() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = format!(
            "{}  linux-6.0.tar.xz\n{}  linux-6.1.tar.xz\n",
            "0".repeat(64),
            digest_of(BODY)
        );
        let transport = FakeTransport::default()
            .serve(ARTIFACT, BODY)
            .serve(MANIFEST, manifest);

        let path = fetch_verified(&transport, ARTIFACT, MANIFEST, dir.path()).unwrap();

        assert_eq!(path, dir.path().join("linux-6.1.tar.xz"));
        assert_eq!(sha256_file(&path).unwrap(), digest_of(BODY));
        // only the artifact is left behind
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn tampered_digest_is_rejected_and_artifact_removed() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = format!("{}  linux-6.1.tar.xz\n", "f".repeat(64));
        let transport = FakeTransport::default()
            .serve(ARTIFACT, BODY)
            .serve(MANIFEST, manifest);

        let err = fetch_verified(&transport, ARTIFACT, MANIFEST, dir.path()).unwrap_err();

        assert!(matches!(err, WizardError::ChecksumMismatch { ref file, .. } if file == "linux-6.1.tar.xz"));
        assert!(!dir.path().join("linux-6.1.tar.xz").exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_manifest_fails_before_comparison() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::default().serve(ARTIFACT, BODY);

        let err = fetch_verified(&transport, ARTIFACT, MANIFEST, dir.path()).unwrap_err();

        assert!(matches!(err, WizardError::ManifestUnavailable { ref url, .. } if url == MANIFEST));
        assert_eq!(*transport.requested.borrow(), vec![ARTIFACT, MANIFEST]);
    }

    #[test]
    fn manifest_without_entry_is_checksum_missing() {
        let dir = tempfile::tempdir().unwrap();
        // prefix of the wanted name must not count as a match
        let manifest = format!("{}  linux-6.1.tar\n", digest_of(BODY));
        let transport = FakeTransport::default()
            .serve(ARTIFACT, BODY)
            .serve(MANIFEST, manifest);

        let err = fetch_verified(&transport, ARTIFACT, MANIFEST, dir.path()).unwrap_err();

        assert!(matches!(err, WizardError::ChecksumMissing { ref file } if file == "linux-6.1.tar.xz"));
    }

    #[test]
    fn artifact_download_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::default();
        let err = fetch_verified(&transport, ARTIFACT, MANIFEST, dir.path()).unwrap_err();
        assert!(matches!(err, WizardError::ExternalTool { .. }));
        assert_eq!(transport.requested.borrow().len(), 1);
    }

    #[test]
    fn file_name_ignores_query_and_trailing_slash() {
        assert_eq!(
            file_name_from_url("https://host/a/b/patch-6.1.xz?raw=1").unwrap(),
            "patch-6.1.xz"
        );
        assert_eq!(file_name_from_url("https://host/dir/file.tar/").unwrap(), "file.tar");
        assert!(file_name_from_url("https://host").is_err());
        assert!(file_name_from_url("https://host/").is_err());
    }

    #[test]
    fn manifest_lines_accept_binary_marker_and_skip_noise() {
        assert_eq!(parse_manifest_line("abc123 *file.iso"), Some(("abc123", "file.iso")));
        assert_eq!(parse_manifest_line("ABC123  file.iso"), Some(("ABC123", "file.iso")));
        assert_eq!(parse_manifest_line("# comment"), None);
        assert_eq!(parse_manifest_line("-----BEGIN PGP SIGNED MESSAGE-----"), None);
        assert_eq!(parse_manifest_line(""), None);
    }

    #[test]
    fn uppercase_manifest_digest_matches() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = format!("{}  linux-6.1.tar.xz\n", digest_of(BODY).to_uppercase());
        let transport = FakeTransport::default()
            .serve(ARTIFACT, BODY)
            .serve(MANIFEST, manifest);
        assert!(fetch_verified(&transport, ARTIFACT, MANIFEST, dir.path()).is_ok());
    }
}
