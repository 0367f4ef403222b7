// ABOUTME: Utility functions for input validation and operator-facing formatting
// ABOUTME: Identifier checks, tool discovery, host path normalisation, byte sizes

use anyhow::{bail, Result};
use which::which;

/// Check that `kubectl` is installed and in PATH
///
/// Every procedure drives the cluster exclusively through kubectl, so there
/// is no point starting one without it.
///
/// # Errors
///
/// Returns an error with installation pointers if kubectl cannot be found.
pub fn check_required_tools() -> Result<()> {
    if which("kubectl").is_err() {
        bail!(
            "Missing required tool: kubectl\n\
             \n\
             Please install kubectl and make sure it is configured for the target cluster:\n\
             - https://kubernetes.io/docs/tasks/tools/\n\
             - macOS: brew install kubectl\n\
             - Ubuntu/Debian: sudo snap install kubectl --classic"
        );
    }

    Ok(())
}

/// Validate a PostgreSQL identifier (database name, role name)
///
/// Database and role names are spliced into catalog queries and the
/// permission-repair script, so they are restricted to:
/// - 1-63 characters
/// - a leading letter (a-z, A-Z) or underscore (_)
/// - letters, digits (0-9) and underscores only
///
/// # Errors
///
/// Returns an error naming the offending character or limit.
///
/// # Examples
///
/// ```
/// # use kube_migrate::utils::validate_postgres_identifier;
/// # use anyhow::Result;
/// # fn example() -> Result<()> {
/// validate_postgres_identifier("prod_blinko")?;
/// validate_postgres_identifier("_private_db")?;
///
/// assert!(validate_postgres_identifier("123db").is_err());
/// assert!(validate_postgres_identifier("db'; DROP DATABASE x; --").is_err());
/// # Ok(())
/// # }
/// ```
pub fn validate_postgres_identifier(identifier: &str) -> Result<()> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        bail!("Identifier cannot be empty or whitespace-only");
    }

    // PostgreSQL truncates at NAMEDATALEN - 1
    if trimmed.len() > 63 {
        bail!(
            "Identifier '{}' exceeds maximum length of 63 characters (got {})",
            sanitize_identifier(trimmed),
            trimmed.len()
        );
    }

    if trimmed != identifier {
        bail!(
            "Identifier '{}' must not have leading or trailing whitespace",
            sanitize_identifier(identifier)
        );
    }

    let mut chars = trimmed.chars();
    if let Some(first_char) = chars.next() {
        if !first_char.is_ascii_alphabetic() && first_char != '_' {
            bail!(
                "Identifier '{}' must start with a letter or underscore, not '{}'",
                sanitize_identifier(trimmed),
                printable(first_char)
            );
        }
    }

    for (i, c) in trimmed.chars().enumerate() {
        if !c.is_ascii_alphanumeric() && c != '_' {
            bail!(
                "Identifier '{}' contains invalid character '{}' at position {}. \
                 Only letters, digits, and underscores are allowed",
                sanitize_identifier(trimmed),
                printable(c),
                i
            );
        }
    }

    Ok(())
}

fn printable(c: char) -> String {
    if c.is_control() {
        format!("\\x{:02x}", c as u32)
    } else {
        c.to_string()
    }
}

/// Sanitize an identifier for display
///
/// Removes control characters and limits length to 100 characters so that
/// error messages and logs stay readable.
///
/// ```
/// # use kube_migrate::utils::sanitize_identifier;
/// assert_eq!(sanitize_identifier("normal_table"), "normal_table");
/// assert_eq!(sanitize_identifier("table\nname"), "tablename");
/// ```
pub fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| !c.is_control())
        .take(100)
        .collect()
}

/// Strip trailing slashes from a node host path, keeping a bare `/`
///
/// The path lives on the Kubernetes node, not on the machine running this
/// tool, so nothing is checked locally.
pub fn normalize_host_path(path: &str) -> Result<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        bail!("Host path cannot be empty");
    }
    if !trimmed.starts_with('/') {
        bail!(
            "Host path '{}' must be absolute (it is resolved on the Kubernetes node)",
            trimmed
        );
    }

    let stripped = trimmed.trim_end_matches('/');
    if stripped.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(stripped.to_string())
    }
}

/// Format byte size into human-readable string
///
/// ```
/// # use kube_migrate::utils::format_bytes;
/// assert_eq!(format_bytes(1536), "1.5 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.1} {}", size, UNITS[unit_idx])
}
