//! Cross-compilation, flashing and debugging tools.
//!
//! The [`Toolchain`] trait is the seam between the build driver and the
//! external tools; [`GnuArmToolchain`] implements it with `arm-none-eabi-*`,
//! OpenOCD and GDB.
//!
//! Tools are looked up in the managed toolchain directory
//! (`<FBT_TOOLCHAIN_PATH>/toolchain/<host>/bin`) first, then on `PATH`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::platform::HostPlatform;
use crate::errors::{UfbtError, UfbtResult};

/// Environment variable overriding the toolchain root.
pub const TOOLCHAIN_PATH_ENV: &str = "FBT_TOOLCHAIN_PATH";

const GCC: &str = "arm-none-eabi-gcc";
const GXX: &str = "arm-none-eabi-g++";
const OBJCOPY: &str = "arm-none-eabi-objcopy";
const NM: &str = "arm-none-eabi-nm";
const GDB_CANDIDATES: [&str; 2] = ["arm-none-eabi-gdb-py3", "arm-none-eabi-gdb"];
const OPENOCD: &str = "openocd";

/// OpenOCD target configuration shipped in the SDK's `debug/` directory.
const OPENOCD_TARGET_CFG: &str = "stm32wbx.cfg";
/// GDB helper that loads application symbols, shipped next to it.
const GDB_APPS_SCRIPT: &str = "flipperapps.py";

/// What a debugging session loads.
#[derive(Debug, Clone, Copy)]
pub struct DebugSession<'a> {
    /// Firmware ELF running on the device.
    pub firmware_elf: &'a Path,
    /// SDK directory with debugger configuration.
    pub debug_dir: &'a Path,
    /// Directory holding application debug ELFs.
    pub app_debug_dir: &'a Path,
}

/// Capabilities the build driver and device commands need.
pub trait Toolchain {
    /// Compiles one source file to an object file.
    ///
    /// # Errors
    ///
    /// Returns an error if the compiler cannot be run or fails.
    fn compile(&self, source: &Path, object: &Path, flags: &[String]) -> UfbtResult<()>;

    /// Links objects into an ELF.
    ///
    /// # Errors
    ///
    /// Returns an error if the linker cannot be run or fails.
    fn link(&self, objects: &[PathBuf], output: &Path, flags: &[String]) -> UfbtResult<()>;

    /// Produces the compact ELF from the debug ELF.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be run or fails.
    fn compact(&self, debug_elf: &Path, output: &Path) -> UfbtResult<()>;

    /// Lists the symbols an ELF references but does not define.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be run or fails.
    fn undefined_symbols(&self, elf: &Path) -> UfbtResult<Vec<String>>;

    /// Writes a firmware image to the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the flasher cannot be run or fails.
    fn flash(&self, firmware_elf: &Path, debug_dir: &Path) -> UfbtResult<()>;

    /// Attaches a debugger to the device with firmware and application
    /// symbols loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the debugger cannot be run or fails.
    fn debug_dump(&self, session: &DebugSession<'_>) -> UfbtResult<()>;
}

/// Managed toolchain directory for `host` under `toolchain_root`.
#[must_use]
pub fn toolchain_bin_dir(toolchain_root: &Path, host: HostPlatform) -> PathBuf {
    toolchain_root.join("toolchain").join(host.as_str()).join("bin")
}

/// The GNU Arm Embedded toolchain with OpenOCD and GDB.
#[derive(Debug, Clone)]
pub struct GnuArmToolchain {
    bin_dir: Option<PathBuf>,
    host: HostPlatform,
}

impl GnuArmToolchain {
    /// Uses the managed toolchain under `toolchain_root` when present.
    ///
    /// # Errors
    ///
    /// Returns [`UfbtError::Configuration`] on unsupported hosts.
    pub fn new(toolchain_root: &Path) -> UfbtResult<Self> {
        let host = HostPlatform::detect()?;
        let bin_dir = toolchain_bin_dir(toolchain_root, host);
        let bin_dir = bin_dir.is_dir().then_some(bin_dir);
        if bin_dir.is_none() {
            tracing::debug!(root = %toolchain_root.display(), "no managed toolchain, using PATH");
        }
        Ok(Self { bin_dir, host })
    }

    /// Finds `tool` in the managed directory, then on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`UfbtError::Configuration`] if the tool is nowhere to be found.
    pub fn locate(&self, tool: &str) -> UfbtResult<PathBuf> {
        if let Some(dir) = &self.bin_dir {
            let candidate = dir.join(format!("{tool}{}", self.host.executable_extension()));
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        which::which(tool).map_err(|_| {
            UfbtError::configuration(format!(
                "{tool} not found in the managed toolchain or PATH; \
                 set {TOOLCHAIN_PATH_ENV} to the toolchain root"
            ))
        })
    }

    fn locate_gdb(&self) -> UfbtResult<PathBuf> {
        GDB_CANDIDATES
            .iter()
            .find_map(|tool| self.locate(tool).ok())
            .ok_or_else(|| UfbtError::configuration("no arm-none-eabi GDB found in the managed toolchain or PATH"))
    }
}

impl Toolchain for GnuArmToolchain {
    fn compile(&self, source: &Path, object: &Path, flags: &[String]) -> UfbtResult<()> {
        let compiler = self.locate(if is_cxx_source(source) { GXX } else { GCC })?;
        let mut cmd = Command::new(compiler);
        cmd.args(flags).arg("-c").arg(source).arg("-o").arg(object);
        run(&mut cmd)
    }

    fn link(&self, objects: &[PathBuf], output: &Path, flags: &[String]) -> UfbtResult<()> {
        let mut cmd = Command::new(self.locate(GCC)?);
        cmd.arg("-o").arg(output).args(objects).args(flags);
        run(&mut cmd)
    }

    fn compact(&self, debug_elf: &Path, output: &Path) -> UfbtResult<()> {
        let mut cmd = Command::new(self.locate(OBJCOPY)?);
        cmd.arg("--strip-debug").arg(debug_elf).arg(output);
        run(&mut cmd)
    }

    fn undefined_symbols(&self, elf: &Path) -> UfbtResult<Vec<String>> {
        let nm = self.locate(NM)?;
        let output = Command::new(&nm)
            .arg("--undefined-only")
            .arg(elf)
            .stderr(Stdio::inherit())
            .output()
            .map_err(|e| UfbtError::io(format!("failed to execute {}", nm.display()), e))?;
        if !output.status.success() {
            return Err(UfbtError::process_exit_code(output.status.code().unwrap_or(1)));
        }
        Ok(parse_undefined_symbols(&String::from_utf8_lossy(&output.stdout)))
    }

    fn flash(&self, firmware_elf: &Path, debug_dir: &Path) -> UfbtResult<()> {
        let mut cmd = Command::new(self.locate(OPENOCD)?);
        cmd.args(openocd_args(debug_dir))
            .arg("-c")
            .arg(format!("program {} reset exit", slashed(firmware_elf)));
        run(&mut cmd)
    }

    fn debug_dump(&self, session: &DebugSession<'_>) -> UfbtResult<()> {
        let openocd = self.locate(OPENOCD)?;
        let mut cmd = Command::new(self.locate_gdb()?);
        cmd.args(gdb_args(&openocd, session));
        run(&mut cmd)
    }
}

/// Returns `true` for C++ sources.
#[must_use]
pub fn is_cxx_source(source: &Path) -> bool {
    source
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e, "cpp" | "cc" | "cxx" | "C"))
}

/// Extracts symbol names from `nm --undefined-only` output.
#[must_use]
pub fn parse_undefined_symbols(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some("U" | "w"), Some(name)) => Some(name.to_string()),
                _ => None,
            }
        })
        .collect()
}

/// OpenOCD paths use forward slashes on every host.
fn slashed(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn openocd_args(debug_dir: &Path) -> Vec<OsString> {
    let target = debug_dir.join(OPENOCD_TARGET_CFG);
    [
        "-f",
        "interface/stlink.cfg",
        "-c",
        "transport select hla_swd",
        "-f",
        &slashed(&target),
        "-c",
        "stm32wbx.cpu configure -rtos auto",
    ]
    .into_iter()
    .map(OsString::from)
    .collect()
}

fn gdb_args(openocd: &Path, session: &DebugSession<'_>) -> Vec<OsString> {
    let openocd_cmdline = std::iter::once(slashed(openocd))
        .chain(openocd_args(session.debug_dir).into_iter().map(|a| {
            let arg = a.to_string_lossy().into_owned();
            if arg.contains(' ') { format!("\"{arg}\"") } else { arg }
        }))
        .chain(["-c".to_string(), "\"gdb_port pipe\"".to_string()])
        .collect::<Vec<_>>()
        .join(" ");

    let mut args: Vec<OsString> = Vec::new();
    let mut ex = |command: String| {
        args.push("-ex".into());
        args.push(command.into());
    };
    ex("set pagination off".to_string());
    ex("set confirm off".to_string());
    ex(format!("target extended-remote | {openocd_cmdline}"));
    ex(format!("source {}", slashed(&session.debug_dir.join(GDB_APPS_SCRIPT))));
    ex(format!("fap-set-debug-elf-root {}", slashed(session.app_debug_dir)));
    args.push(session.firmware_elf.into());
    args
}

/// Runs a tool with inherited stdio, mapping a non-zero exit to
/// [`UfbtError::ProcessExitCode`].
///
/// # Errors
///
/// Returns [`UfbtError::Io`] if the tool cannot be started.
pub fn run(cmd: &mut Command) -> UfbtResult<()> {
    tracing::debug!(command = ?cmd, "running tool");
    let program = PathBuf::from(cmd.get_program());
    let status = cmd
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| UfbtError::io(format!("failed to execute {}", program.display()), e))?;

    if status.success() {
        Ok(())
    } else {
        Err(UfbtError::process_exit_code(status.code().unwrap_or(1)))
    }
}
