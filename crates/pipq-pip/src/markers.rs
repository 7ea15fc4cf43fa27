use std::process::Command;

use tracing::debug;

use pipq_pep508::MarkerEnvironment;

use crate::{call::python, Error};

/// Queries the marker environment of the configured Python interpreter.
///
/// Runs an embedded script under `<python>` and deserializes its JSON output.
/// Callers that evaluate requirement markers against the real environment feed
/// the result into their parse options.
pub fn marker_environment() -> Result<MarkerEnvironment, Error> {
    let python = python();
    debug!("Querying marker environment from `{python}`");
    let output = Command::new(&python)
        .args(["-c", include_str!("get_marker_environment.py")])
        .output()
        .map_err(|source| Error::Launch {
            python: python.clone(),
            source,
        })?;
    if !output.status.success() {
        return Err(Error::ProcessExecution {
            command: format!("{python} -c <get_marker_environment.py>"),
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(serde_json::from_slice(&output.stdout)?)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use pipq_pep508::MarkerEnvironment;

    #[test]
    fn deserialize_interpreter_json() {
        let json = indoc! {r##"
            {
                "implementation_name": "cpython",
                "implementation_version": "3.11.7",
                "os_name": "posix",
                "platform_machine": "x86_64",
                "platform_python_implementation": "CPython",
                "platform_release": "6.1.0",
                "platform_system": "Linux",
                "platform_version": "#1 SMP",
                "python_full_version": "3.11.7",
                "python_version": "3.11",
                "sys_platform": "linux"
            }
        "##};
        let env: MarkerEnvironment = serde_json::from_str(json).unwrap();
        assert_eq!(env.python_version.version.to_string(), "3.11");
        assert_eq!(env.implementation_name, "cpython");
    }
}
