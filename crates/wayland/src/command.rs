//! Detached command execution.
//!
//! Commands run via double fork: the intermediate child starts a new session
//! and resets the signal mask, the grandchild execs `/bin/sh -c`, and the
//! parent reaps only the intermediate. The grandchild is inherited by PID 1
//! and never blocks the event loop.

use nix::sys::signal::{sigprocmask, SigSet, SigmaskHow};
use nix::unistd::{execve, fork, setsid, ForkResult};
use std::ffi::CString;
use tracing::{debug, warn};

/// Environment variables describing the output the bar instance lives on.
const ENV_OUTPUT_NAME: &str = "LAVALAUNCHER_OUTPUT_NAME";
const ENV_OUTPUT_SCALE: &str = "LAVALAUNCHER_OUTPUT_SCALE";

/// Run `command` through `/bin/sh -c`, detached from this process.
///
/// Spawn failures are logged, never fatal.
pub fn spawn(command: &str, output_name: &str, output_scale: i32) {
    debug!("Executing command: {command}");

    // Everything the children need is allocated before forking.
    let Ok(shell) = CString::new("/bin/sh") else {
        return;
    };
    let argv: Vec<CString> = match [
        CString::new("sh"),
        CString::new("-c"),
        CString::new(command),
    ]
    .into_iter()
    .collect::<Result<_, _>>()
    {
        Ok(argv) => argv,
        Err(e) => {
            warn!("Command contains NUL byte: {e}");
            return;
        }
    };
    let envp: Vec<CString> = std::env::vars()
        .filter(|(k, _)| k != ENV_OUTPUT_NAME && k != ENV_OUTPUT_SCALE)
        .chain([
            (ENV_OUTPUT_NAME.to_string(), output_name.to_string()),
            (ENV_OUTPUT_SCALE.to_string(), output_scale.to_string()),
        ])
        .filter_map(|(k, v)| CString::new(format!("{k}={v}")).ok())
        .collect();

    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            // The intermediate exits immediately; reap it synchronously.
            let _ = nix::sys::wait::waitpid(child, None);
        }
        Ok(ForkResult::Child) => {
            let _ = setsid();
            let _ = sigprocmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None);
            match unsafe { fork() } {
                Ok(ForkResult::Parent { .. }) => unsafe { nix::libc::_exit(0) },
                Ok(ForkResult::Child) => {
                    let _ = execve(&shell, &argv, &envp);
                    unsafe { nix::libc::_exit(127) }
                }
                Err(_) => unsafe { nix::libc::_exit(1) },
            }
        }
        Err(e) => warn!("Cannot fork to execute command: {e}"),
    }
}
