// # Lease Recovery
//
// A DHCPv6 client keeps its leases on disk across our restarts, but the
// prefix registry starts empty. At startup the daemon scans the client's
// lease directory and replays every delegated prefix as a fresh
// `prefix-assigned`, since it cannot know which ones were announced before.
//
// ## Lease File Layout
//
// File names carry the interface, e.g. `dhclient_v6_eth0.leases`; prefixes
// appear on lines like:
//
// ```text
//   ia-pd 1a2b3c4d {
//     iaprefix 2001:db8:1::/56 {
// ```

use regex::Regex;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Default lease file name pattern; the capture group is the interface
pub const DEFAULT_LEASE_PATTERN: &str = r"dhclient_v6_(.*)\.leases";

/// A prefix found in a lease file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeasedPrefix {
    pub interface: String,
    pub prefix: String,
}

/// Compile a lease file name pattern
///
/// The pattern must have exactly one capture group naming the interface.
pub fn lease_pattern(pattern: &str) -> Result<Regex> {
    let regex = Regex::new(pattern)
        .map_err(|e| Error::config(format!("invalid lease pattern {}: {}", pattern, e)))?;
    if regex.captures_len() != 2 {
        return Err(Error::config(format!(
            "lease pattern {} must have exactly one capture group",
            pattern
        )));
    }
    Ok(regex)
}

/// Distinct prefixes of one lease file, in order of first appearance
pub fn parse_lease_file(content: &str) -> Vec<String> {
    let mut prefixes: Vec<String> = Vec::new();
    for line in content.lines() {
        let Some(prefix) = iaprefix(line) else {
            continue;
        };
        if !prefixes.iter().any(|seen| seen == prefix) {
            prefixes.push(prefix.to_string());
        }
    }
    prefixes
}

fn iaprefix(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("iaprefix ")?;
    let prefix = rest.strip_suffix('{')?.trim();
    (!prefix.is_empty()).then_some(prefix)
}

/// Scan `dir` for lease files matching `pattern`
///
/// Unreadable lease files are skipped with a warning. Results are ordered
/// by interface name.
pub async fn scan_lease_dir(dir: &Path, pattern: &Regex) -> Result<Vec<LeasedPrefix>> {
    let mut entries = fs::read_dir(dir).await.map_err(|e| {
        Error::lease(format!("failed to read lease directory {}: {}", dir.display(), e))
    })?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(interface) = pattern
            .captures(name)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
        else {
            continue;
        };
        files.push((interface, entry.path()));
    }
    files.sort();

    let mut leased = Vec::new();
    for (interface, path) in files {
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                warn!("failed to read lease file {}: {}", path.display(), e);
                continue;
            }
        };
        let prefixes = parse_lease_file(&content);
        debug!("unique prefixes for {}: {:?}", interface, prefixes);
        leased.extend(prefixes.into_iter().map(|prefix| LeasedPrefix {
            interface: interface.clone(),
            prefix,
        }));
    }

    Ok(leased)
}
