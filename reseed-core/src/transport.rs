//! Repository locator classification
//!
//! Requests carry `use_ssh_*` flags that describe which URL form the caller
//! intends to pass. They are labels only; this module lets the orchestrator
//! notice when a locator does not look like what its flag claims.

use std::fmt;

/// How a repository locator reaches its repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// `git@host:owner/repo.git` or `ssh://...`
    Ssh,
    /// `https://...` or `http://...`
    Https,
    /// `file://...` or a plain filesystem path
    File,
    /// Anything else git may understand (`git://`, remote helpers, ...)
    Other,
}

impl Transport {
    /// Classify a repository locator
    ///
    /// Supports:
    /// - `git@github.com:owner/repo.git` (scp-like SSH)
    /// - `ssh://git@github.com/owner/repo.git`
    /// - `https://github.com/owner/repo.git`
    /// - `file:///srv/repos/repo.git`, `/srv/repos/repo.git`, `../repo`
    pub fn detect(locator: &str) -> Self {
        let locator = locator.trim();

        if let Ok(url) = url::Url::parse(locator) {
            return match url.scheme() {
                "ssh" | "git+ssh" | "ssh+git" => Self::Ssh,
                "https" | "http" => Self::Https,
                "file" => Self::File,
                // Windows drive letters parse as a one-letter scheme
                s if s.len() == 1 => Self::File,
                _ => Self::Other,
            };
        }

        // scp-like syntax: [user@]host:path, where host has no slash
        if let Some((host, _path)) = locator.split_once(':') {
            if !host.is_empty() && !host.contains('/') {
                return Self::Ssh;
            }
        }

        Self::File
    }

    /// Protocol label for a `use_ssh_*` flag
    pub fn label_for(use_ssh: bool) -> &'static str {
        if use_ssh {
            "SSH"
        } else {
            "HTTPS"
        }
    }

    /// Whether this transport contradicts a `use_ssh_*` flag
    ///
    /// Local paths and unknown transports never contradict.
    pub fn contradicts(&self, use_ssh: bool) -> bool {
        match self {
            Self::Ssh => !use_ssh,
            Self::Https => use_ssh,
            Self::File | Self::Other => false,
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ssh => "ssh",
            Self::Https => "https",
            Self::File => "file",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_scp_ssh() {
        assert_eq!(Transport::detect("git@github.com:owner/repo.git"), Transport::Ssh);
    }

    #[test]
    fn test_detect_ssh_scheme() {
        assert_eq!(
            Transport::detect("ssh://git@github.com/owner/repo.git"),
            Transport::Ssh
        );
    }

    #[test]
    fn test_detect_https() {
        assert_eq!(Transport::detect("https://github.com/owner/repo"), Transport::Https);
        assert_eq!(Transport::detect("http://gitea.local/owner/repo.git"), Transport::Https);
    }

    #[test]
    fn test_detect_local_paths() {
        assert_eq!(Transport::detect("/srv/repos/repo.git"), Transport::File);
        assert_eq!(Transport::detect("../sibling"), Transport::File);
        assert_eq!(Transport::detect("file:///srv/repos/repo.git"), Transport::File);
    }

    #[test]
    fn test_detect_other() {
        assert_eq!(Transport::detect("git://example.org/repo.git"), Transport::Other);
    }

    #[test]
    fn test_contradicts() {
        assert!(Transport::Https.contradicts(true));
        assert!(Transport::Ssh.contradicts(false));
        assert!(!Transport::Ssh.contradicts(true));
        assert!(!Transport::File.contradicts(true));
        assert!(!Transport::File.contradicts(false));
    }
}
