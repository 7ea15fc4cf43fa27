use std::env;
use std::process::Command;

use tracing::debug;

use crate::Error;

/// The Python executable pip runs under.
pub(crate) fn python() -> String {
    env::var("PIPQ_PYTHON_LOCATION").unwrap_or_else(|_| "python".to_string())
}

/// Runs `<python> -m pip <args...>` and returns its stdout.
pub fn call(args: &[&str]) -> Result<String, Error> {
    let python = python();
    debug!("Running `{python} -m pip {}`", args.join(" "));
    let output = Command::new(&python)
        .arg("-m")
        .arg("pip")
        .args(args)
        .output()
        .map_err(|source| Error::Launch {
            python: python.clone(),
            source,
        })?;
    if !output.status.success() {
        return Err(Error::ProcessExecution {
            command: format!("{python} -m pip {}", args.join(" ")),
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
