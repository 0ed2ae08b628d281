//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and credentials are available before
//! starting work that would otherwise fail midway.

use crate::config::Credentials;
use crate::error::{CapabilityError, NewsreelError, Result};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Producing briefs needs OpenAI, the animation key and the media tools.
    Produce,
    /// Asking questions needs OpenAI only.
    Ask,
}

/// Run pre-flight checks for the given operation.
///
/// Missing animation credentials are not fatal here since only video needs
/// them; the returned list holds such warnings.
pub fn check(operation: Operation, credentials: &Credentials) -> Result<Vec<String>> {
    check_api_key(credentials)?;

    let mut warnings = Vec::new();
    if let Operation::Produce = operation {
        for tool in ["ffmpeg", "ffprobe"] {
            if let Err(e) = check_tool(tool) {
                warnings.push(format!("{} (video briefs will fail)", e));
            }
        }
        if credentials.stability_api_key.is_none() {
            warnings.push("STABILITY_KEY not set (video briefs will fail)".to_string());
        }
    }
    Ok(warnings)
}

/// Check that an OpenAI API key is configured.
pub fn check_api_key(credentials: &Credentials) -> Result<()> {
    match credentials.openai_api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => Ok(()),
        _ => Err(NewsreelError::Config(
            "OpenAI API key not set. Set it with: export OPENAI_API_KEY='sk-...' or in [credentials]".to_string(),
        )),
    }
}

/// Check if an external tool is available.
pub fn check_tool(name: &str) -> std::result::Result<(), CapabilityError> {
    match Command::new(name).arg("-version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(CapabilityError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CapabilityError::ToolNotFound(name.to_string())),
        Err(e) => Err(CapabilityError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_fails() {
        let credentials = Credentials {
            openai_api_key: None,
            stability_api_key: None,
        };
        assert!(check(Operation::Ask, &credentials).is_err());
    }

    #[test]
    fn test_ask_needs_only_openai() {
        let credentials = Credentials {
            openai_api_key: Some("sk-test".into()),
            stability_api_key: None,
        };
        assert!(check(Operation::Ask, &credentials).unwrap().is_empty());
    }

    #[test]
    fn test_produce_warns_without_stability_key() {
        let credentials = Credentials {
            openai_api_key: Some("sk-test".into()),
            stability_api_key: None,
        };
        let warnings = check(Operation::Produce, &credentials).unwrap();
        assert!(warnings.iter().any(|w| w.contains("STABILITY_KEY")));
    }

    #[test]
    fn test_unknown_tool() {
        assert!(matches!(
            check_tool("newsreel-no-such-tool"),
            Err(CapabilityError::ToolNotFound(_))
        ));
    }
}
