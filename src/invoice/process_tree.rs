//! Ownership of a converter process and everything it spawns.
//!
//! On unix the child leads its own process group, so signalling the group
//! reaches forked workers such as `soffice.bin`. On Windows the child is
//! placed in a Job Object created with `JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE`.
//! Either way the whole tree is killed when the `ProcessTree` is dropped.

use std::time::Duration;

use tokio::process::{Child, Command};

/// Time between the polite and the forced termination signal.
const TERM_GRACE: Duration = Duration::from_millis(500);

/// Set up `cmd` so that its process tree can be signalled as a unit.
pub(crate) fn isolate(cmd: &mut Command) {
    #[cfg(unix)]
    cmd.process_group(0);
    #[cfg(not(unix))]
    let _ = cmd;
}

pub(crate) struct ProcessTree {
    #[cfg(unix)]
    pgid: Option<nix::unistd::Pid>,
    #[cfg(windows)]
    job: Option<job::Job>,
}

impl ProcessTree {
    /// Take ownership of the tree rooted at a child spawned from an isolated command.
    pub(crate) fn attach(child: &Child) -> Self {
        #[cfg(unix)]
        {
            Self {
                pgid: child
                    .id()
                    .map(|pid| nix::unistd::Pid::from_raw(pid as i32)),
            }
        }

        #[cfg(windows)]
        {
            let job = child.id().and_then(|pid| match job::Job::for_process(pid) {
                Ok(job) => Some(job),
                Err(e) => {
                    log::warn!("Failed to put LibreOffice process {} in a job object: {}", pid, e);
                    None
                }
            });
            Self { job }
        }

        #[cfg(not(any(unix, windows)))]
        {
            let _ = child;
            Self {}
        }
    }

    /// SIGTERM the group, give it [`TERM_GRACE`] to exit, then SIGKILL it and reap the child.
    pub(crate) async fn terminate(&self, child: &mut Child) {
        #[cfg(unix)]
        {
            use nix::sys::signal::Signal;

            self.signal(Signal::SIGTERM);
            let _ = tokio::time::timeout(TERM_GRACE, child.wait()).await;
            self.signal(Signal::SIGKILL);
        }

        #[cfg(windows)]
        {
            if let Some(ref job) = self.job {
                job.terminate();
            }
        }

        if let Err(e) = child.start_kill() {
            log::debug!("LibreOffice process already gone: {}", e);
        }
        let _ = tokio::time::timeout(TERM_GRACE, child.wait()).await;
    }

    #[cfg(unix)]
    fn signal(&self, signal: nix::sys::signal::Signal) {
        use nix::errno::Errno;
        use nix::sys::signal::killpg;

        let Some(pgid) = self.pgid else {
            return;
        };
        match killpg(pgid, signal) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => log::warn!("Failed to send {} to process group {}: {}", signal, pgid, e),
        }
    }
}

impl Drop for ProcessTree {
    fn drop(&mut self) {
        // Stragglers that outlived the child, or a request cancelled mid-conversion.
        #[cfg(unix)]
        self.signal(nix::sys::signal::Signal::SIGKILL);
        // Closing the job handle kills whatever is left in it.
        #[cfg(windows)]
        drop(self.job.take());
    }
}

#[cfg(windows)]
mod job {
    use windows::core::Result;
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::JobObjects::{
        AssignProcessToJobObject, CreateJobObjectW, JobObjectExtendedLimitInformation,
        SetInformationJobObject, TerminateJobObject, JOBOBJECT_EXTENDED_LIMIT_INFORMATION,
        JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE,
    };
    use windows::Win32::System::Threading::{OpenProcess, PROCESS_ALL_ACCESS};

    pub(super) struct Job {
        handle: HANDLE,
    }

    // SAFETY: a job handle is an opaque kernel reference usable from any thread.
    unsafe impl Send for Job {}
    unsafe impl Sync for Job {}

    impl Job {
        pub(super) fn for_process(pid: u32) -> Result<Self> {
            unsafe {
                let job = Self {
                    handle: CreateJobObjectW(None, None)?,
                };

                let mut info: JOBOBJECT_EXTENDED_LIMIT_INFORMATION = std::mem::zeroed();
                info.BasicLimitInformation.LimitFlags = JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;
                SetInformationJobObject(
                    job.handle,
                    JobObjectExtendedLimitInformation,
                    (&raw const info).cast(),
                    std::mem::size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
                )?;

                let process = OpenProcess(PROCESS_ALL_ACCESS, false, pid)?;
                let assigned = AssignProcessToJobObject(job.handle, process);
                let _ = CloseHandle(process);
                assigned?;

                Ok(job)
            }
        }

        pub(super) fn terminate(&self) {
            unsafe {
                let _ = TerminateJobObject(self.handle, 1);
            }
        }
    }

    impl Drop for Job {
        fn drop(&mut self) {
            unsafe {
                let _ = CloseHandle(self.handle);
            }
        }
    }
}
