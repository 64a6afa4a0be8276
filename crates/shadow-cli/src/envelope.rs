//! The `{success, output?, error?}` result envelope every subcommand prints
//! as its sole line of stdout.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// Print an `Envelope` wrapping `output` and return exit code 0.
pub fn ok<T: Serialize>(output: T) -> i32 {
    let envelope = Envelope {
        success: true,
        output: Some(output),
        error: None,
    };
    print_json(&envelope);
    0
}

/// Print an `Envelope` wrapping `error` and return exit code 1.
pub fn err(error: &shadow_manager::Error) -> i32 {
    let envelope: Envelope<()> = Envelope {
        success: false,
        output: None,
        error: Some(ErrorBody {
            message: error.to_string(),
            code: Some(error_code(error).to_string()),
            details: None,
        }),
    };
    print_json(&envelope);
    1
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(e) => eprintln!("failed to serialize result envelope: {e}"),
    }
}

fn error_code(error: &shadow_manager::Error) -> &'static str {
    use shadow_manager::Error::*;
    match error {
        InvalidInput { .. } => "invalid_input",
        NotFound { .. } => "not_found",
        AlreadyExists { .. } => "already_exists",
        InvalidLocalPath { .. } => "invalid_local_path",
        SnapshotFailed { .. } => "snapshot_failed",
        ImageUnavailable { .. } => "image_unavailable",
        ContainerRuntimeUnavailable => "container_runtime_unavailable",
        ContainerStartFailed { .. } => "container_start_failed",
        ContainerNotRunning { .. } => "container_not_running",
        ForgeNotReady { .. } => "forge_not_ready",
        ForgeError { .. } => "forge_error",
        RewriteNotApplied { .. } => "rewrite_not_applied",
        Timeout { .. } => "timeout",
        Cancelled => "cancelled",
        VerificationFailed { .. } => "verification_failed",
        Internal(_) => "internal",
        Io(_) => "io",
        Serde(_) => "serde",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadow_manager::Error;

    #[test]
    fn ok_returns_exit_code_zero() {
        assert_eq!(ok(serde_json::json!({"id": "shadow-1"})), 0);
    }

    #[test]
    fn err_returns_exit_code_one() {
        let error = Error::NotFound {
            message: "no such shadow: shadow-1".to_string(),
        };
        assert_eq!(err(&error), 1);
    }

    #[test]
    fn error_code_maps_known_variants() {
        assert_eq!(error_code(&Error::ContainerRuntimeUnavailable), "container_runtime_unavailable");
        assert_eq!(error_code(&Error::Cancelled), "cancelled");
        assert_eq!(
            error_code(&Error::AlreadyExists { message: "x".to_string() }),
            "already_exists"
        );
    }
}
