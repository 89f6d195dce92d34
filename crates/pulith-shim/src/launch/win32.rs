use super::{Backend, ChildProcess, LaunchError};
use crate::cmdline::CommandLine;
use crate::env::Environment;
use std::ffi::{OsStr, c_void};
use std::os::windows::ffi::OsStrExt;
use windows::Win32::Foundation::{CloseHandle, ERROR_ELEVATION_REQUIRED, HANDLE, WAIT_FAILED};
use windows::Win32::System::Threading::{
    CREATE_UNICODE_ENVIRONMENT, CreateProcessW, GetExitCodeProcess, GetProcessId, INFINITE,
    PROCESS_CREATION_FLAGS, PROCESS_INFORMATION, STARTUPINFOW, WaitForSingleObject,
};
use windows::Win32::UI::Shell::{
    SEE_MASK_NOASYNC, SEE_MASK_NOCLOSEPROCESS, SHELLEXECUTEINFOW, ShellExecuteExW,
};
use windows::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;
use windows::core::{PCWSTR, PWSTR};

const ERROR_INVALID_HANDLE: i32 = 6;

/// `CreateProcessW` with inherited handles and console.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectBackend;

/// `ShellExecuteExW` with the `runas` verb. Opens a new console window.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElevatedBackend;

impl Backend for DirectBackend {
    fn name(&self) -> &'static str { "create-process" }

    fn launch(
        &self,
        command: &CommandLine,
        env: Option<&Environment>,
    ) -> Result<Box<dyn ChildProcess>, LaunchError> {
        let mut line = wide(command.render());
        let block = env.map(Environment::to_wide_block);
        let flags = match block {
            Some(_) => CREATE_UNICODE_ENVIRONMENT,
            None => PROCESS_CREATION_FLAGS(0),
        };
        let env_ptr = block.as_ref().map(|b| b.as_ptr() as *const c_void);

        let mut si = STARTUPINFOW::default();
        si.cb = std::mem::size_of::<STARTUPINFOW>() as u32;
        let mut pi = PROCESS_INFORMATION::default();

        let created = unsafe {
            CreateProcessW(
                PCWSTR::null(),
                Some(PWSTR(line.as_mut_ptr())),
                None,
                None,
                true,
                flags,
                env_ptr,
                PCWSTR::null(),
                &si,
                &mut pi,
            )
        };

        if let Err(err) = created {
            if err.code() == ERROR_ELEVATION_REQUIRED.to_hresult() {
                return Err(LaunchError::ElevationRequired);
            }
            return Err(LaunchError::Os(native_code(&err)));
        }

        Ok(Box::new(Win32Child {
            process: OwnedHandle(pi.hProcess),
            _thread: Some(OwnedHandle(pi.hThread)),
            id:      pi.dwProcessId,
        }))
    }
}

impl Backend for ElevatedBackend {
    fn name(&self) -> &'static str { "shell-execute-runas" }

    fn launch(
        &self,
        command: &CommandLine,
        env: Option<&Environment>,
    ) -> Result<Box<dyn ChildProcess>, LaunchError> {
        if env.is_some() {
            tracing::debug!("environment overrides are not applied to elevated launches");
        }

        let verb = wide("runas");
        let file = wide(command.program());
        let params = wide(command.tail());

        let mut exec = SHELLEXECUTEINFOW::default();
        exec.cbSize = std::mem::size_of::<SHELLEXECUTEINFOW>() as u32;
        exec.fMask = SEE_MASK_NOCLOSEPROCESS | SEE_MASK_NOASYNC;
        exec.lpVerb = PCWSTR(verb.as_ptr());
        exec.lpFile = PCWSTR(file.as_ptr());
        exec.lpParameters = PCWSTR(params.as_ptr());
        exec.nShow = SW_SHOWNORMAL.0 as i32;

        unsafe { ShellExecuteExW(&mut exec) }.map_err(|e| LaunchError::Os(native_code(&e)))?;

        let process = exec.hProcess;
        if process.is_invalid() {
            return Err(LaunchError::Os(ERROR_INVALID_HANDLE));
        }

        Ok(Box::new(Win32Child {
            process: OwnedHandle(process),
            _thread: None,
            id:      unsafe { GetProcessId(process) },
        }))
    }
}

struct OwnedHandle(HANDLE);

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            unsafe {
                let _ = CloseHandle(self.0);
            }
        }
    }
}

struct Win32Child {
    process: OwnedHandle,
    _thread: Option<OwnedHandle>,
    id:      u32,
}

impl ChildProcess for Win32Child {
    fn id(&self) -> u32 { self.id }

    fn wait(&mut self) -> Result<i32, LaunchError> {
        let event = unsafe { WaitForSingleObject(self.process.0, INFINITE) };
        if event == WAIT_FAILED {
            return Err(LaunchError::from_io(&std::io::Error::last_os_error()));
        }

        let mut code: u32 = 0;
        unsafe { GetExitCodeProcess(self.process.0, &mut code) }
            .map_err(|e| LaunchError::Os(native_code(&e)))?;
        Ok(code as i32)
    }
}

fn wide(s: impl AsRef<OsStr>) -> Vec<u16> {
    s.as_ref().encode_wide().chain(std::iter::once(0)).collect()
}

/// Win32 error code carried by `err`, or the raw HRESULT otherwise.
fn native_code(err: &windows::core::Error) -> i32 {
    let hr = err.code().0 as u32;
    if hr & 0xFFFF_0000 == 0x8007_0000 {
        (hr & 0xFFFF) as i32
    } else {
        hr as i32
    }
}
