//! Line-oriented command shell.
//!
//! The shell owns the filesystem and the process table and runs programs
//! through the machine library. Input and output are generic so
//! the same loop serves a terminal, a script file or a test buffer.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use risc_vm::{
    CancelToken, ExecOptions, ExecStatus, Fault, ProcessTable, SlotId, TraceRecord, Tracer,
};

use crate::vfs::Vfs;

pub const PROMPT: &str = "root@vunix: ";

/// Instruction budget for a program run when none is configured.
pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Load address for executed images.
    pub origin: u16,
    /// Per-run instruction budget.
    pub max_steps: Option<u64>,
    /// Trace every run, not only `exec -d`.
    pub debug: bool,
    /// Directory receiving core files after a fault.
    pub core_dir: Option<PathBuf>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            origin: 0,
            max_steps: Some(DEFAULT_MAX_STEPS),
            debug: false,
            core_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Writes trace records to the shell's output, keeping the first I/O error.
struct EchoTracer<'w, W: Write> {
    out: &'w mut W,
    error: Option<io::Error>,
}

impl<W: Write> Tracer for EchoTracer<'_, W> {
    fn record(&mut self, record: &TraceRecord) {
        if self.error.is_none() {
            if let Err(e) = writeln!(self.out, "  {record}") {
                self.error = Some(e);
            }
        }
    }
}

pub struct Shell {
    vfs: Vfs,
    procs: ProcessTable,
    /// Outcome of the last run of every retained slot.
    status: BTreeMap<SlotId, ExecStatus>,
    config: ShellConfig,
    cancel: CancelToken,
}

impl Shell {
    pub fn new(vfs: Vfs, config: ShellConfig) -> Self {
        Self {
            vfs,
            procs: ProcessTable::new(),
            status: BTreeMap::new(),
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Handle that stops the program currently running under `exec`.
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.procs
    }

    /// Read and run commands until `exit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, out: &mut W) -> io::Result<()> {
        let mut line = String::new();
        loop {
            write!(out, "{PROMPT}")?;
            out.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                writeln!(out)?;
                return Ok(());
            }
            let cmd = line.trim_end_matches(['\r', '\n']);
            if self.handle_line(cmd, out)? == Flow::Exit {
                return Ok(());
            }
        }
    }

    pub fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> io::Result<Flow> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Flow::Continue);
        }
        let (cmd, args) = match trimmed.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (trimmed, ""),
        };

        match cmd {
            "exit" => return Ok(Flow::Exit),
            // echo keeps inner spacing, so slice the raw line.
            "echo" => writeln!(out, "{}", line.trim_start().get(5..).unwrap_or(""))?,
            "clear" => write!(out, "\x1b[H\x1b[2J")?,
            "help" => self.help(out)?,
            "ls" => self.ls(out)?,
            "cat" => self.cat(args, out)?,
            "rm" => self.rm(args, out)?,
            "exec" => self.exec(args, out)?,
            "ps" => self.ps(out)?,
            "dump" => self.dump(args, out)?,
            "kill" => self.kill(args, out)?,
            _ => writeln!(out, "Unknown command: {trimmed}")?,
        }
        Ok(Flow::Continue)
    }

    fn help<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "  exit\t\t\texit the shell")?;
        writeln!(out, "  echo <str>\t\techo")?;
        writeln!(out, "  clear\t\t\tclear the screen")?;
        writeln!(out, "  ls\t\t\tlist files")?;
        writeln!(out, "  cat <file>\t\tshow file contents")?;
        writeln!(out, "  rm <file>\t\tremove a file")?;
        writeln!(out, "  exec [-d] <file>\texec binary (-d traces each instruction)")?;
        writeln!(out, "  ps\t\t\tlist retained processes")?;
        writeln!(out, "  dump <slot>\t\tshow registers and flags of a process")?;
        writeln!(out, "  kill <slot>\t\tfree a process slot")?;
        writeln!(out, "  help\t\t\thelp")
    }

    fn ls<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let files = self.vfs.files();
        let dirs = self.vfs.dirs();
        writeln!(out, "total {}f {}d", files.len(), dirs.len())?;
        for (i, file) in files.iter().enumerate() {
            writeln!(out, "  file {} {}", i, file.name())?;
        }
        for (i, dir) in dirs.iter().enumerate() {
            writeln!(out, "  dir  {} {}/", i, dir)?;
        }
        writeln!(out)
    }

    fn cat<W: Write>(&self, args: &str, out: &mut W) -> io::Result<()> {
        if args.is_empty() {
            writeln!(out, "cat -- Output file content")?;
            return writeln!(out, "Usage: cat <file>");
        }
        match self.vfs.open(args) {
            Some(file) => writeln!(out, "{}", String::from_utf8_lossy(file.content())),
            None => writeln!(out, "File {args} doesn't exist"),
        }
    }

    fn rm<W: Write>(&mut self, args: &str, out: &mut W) -> io::Result<()> {
        if args.is_empty() {
            return writeln!(out, "Usage: rm <file>");
        }
        match self.vfs.remove(args) {
            Ok(file) => {
                log::debug!("removed {} ({} bytes)", file.name(), file.len());
                Ok(())
            }
            Err(e) => writeln!(out, "rm: {e}"),
        }
    }

    fn exec<W: Write>(&mut self, args: &str, out: &mut W) -> io::Result<()> {
        let (debug, name) = match args.strip_prefix("-d") {
            Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
                (true, rest.trim())
            }
            _ => (false, args),
        };
        if name.is_empty() {
            writeln!(out, "exec -- Load v.out files to memory and execute them")?;
            return writeln!(out, "Usage: exec [-d] <file>");
        }
        let Some(file) = self.vfs.open(name) else {
            return writeln!(out, "File {name} doesn't exist");
        };

        let origin = self.config.origin;
        let id = match self.procs.allocate(origin) {
            Ok(id) => id,
            Err(e) => return writeln!(out, "exec: {e}"),
        };
        let cpu = match self.procs.get_mut(id) {
            Ok(cpu) => cpu,
            Err(e) => return writeln!(out, "exec: {e}"),
        };
        if let Err(e) = cpu.load_image(file.content(), origin) {
            writeln!(out, "exec: {name}: {e}")?;
            return self.free(id, out);
        }

        let options = ExecOptions {
            debug: debug || self.config.debug,
            max_steps: self.config.max_steps,
            cancel: Some(self.cancel.clone()),
        };
        let mut tracer = EchoTracer { out: &mut *out, error: None };
        let result = cpu.run(&options, &mut tracer);
        if let Some(e) = tracer.error {
            return Err(e);
        }

        writeln!(out, "[{id}] {name}: {} after {} steps", result.status, result.steps)?;
        match result.status {
            ExecStatus::Halted => return self.free(id, out),
            ExecStatus::Faulted(fault) => {
                write!(out, "{}", cpu.dump())?;
                self.write_core(id, fault, out)?;
            }
            ExecStatus::Cancelled => self.cancel.reset(),
            ExecStatus::StepLimitExceeded => {}
        }
        self.status.insert(id, result.status);
        writeln!(out, "[{id}] retained; `dump {id}` to inspect, `kill {id}` to free")
    }

    fn write_core<W: Write>(&self, id: SlotId, fault: Fault, out: &mut W) -> io::Result<()> {
        let Some(dir) = &self.config.core_dir else {
            return Ok(());
        };
        let cpu = match self.procs.get(id) {
            Ok(cpu) => cpu,
            Err(e) => return writeln!(out, "core: {e}"),
        };
        let path = dir.join(format!("core.{id}"));
        match cpu.core_dump(fault).to_bytes() {
            Ok(bytes) => match std::fs::write(&path, bytes) {
                Ok(()) => writeln!(out, "[{id}] core written to {}", path.display()),
                Err(e) => writeln!(out, "core: {}: {e}", path.display()),
            },
            Err(e) => writeln!(out, "core: {e}"),
        }
    }

    fn free<W: Write>(&mut self, id: SlotId, out: &mut W) -> io::Result<()> {
        self.status.remove(&id);
        if let Err(e) = self.procs.free(id) {
            writeln!(out, "kill: {e}")?;
        }
        Ok(())
    }

    fn ps<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "SLOT  PC      STATUS")?;
        for (id, cpu) in self.procs.iter() {
            let status = self
                .status
                .get(&id)
                .map(ToString::to_string)
                .unwrap_or_else(|| "loaded".to_string());
            writeln!(out, "{:<5} {:#06x}  {}", id, cpu.pc(), status)?;
        }
        writeln!(out, "{}/{} slots in use", self.procs.len(), self.procs.capacity())
    }

    fn parse_slot<W: Write>(cmd: &str, args: &str, out: &mut W) -> io::Result<Option<SlotId>> {
        match args.parse::<usize>() {
            Ok(index) => Ok(Some(SlotId::new(index))),
            Err(_) => {
                writeln!(out, "Usage: {cmd} <slot>")?;
                Ok(None)
            }
        }
    }

    fn dump<W: Write>(&self, args: &str, out: &mut W) -> io::Result<()> {
        let Some(id) = Self::parse_slot("dump", args, out)? else {
            return Ok(());
        };
        match self.procs.get(id) {
            Ok(cpu) => write!(out, "{}", cpu.dump()),
            Err(e) => writeln!(out, "dump: {e}"),
        }
    }

    fn kill<W: Write>(&mut self, args: &str, out: &mut W) -> io::Result<()> {
        let Some(id) = Self::parse_slot("kill", args, out)? else {
            return Ok(());
        };
        match self.procs.free(id) {
            Ok(()) => {
                self.status.remove(&id);
                writeln!(out, "[{id}] freed")
            }
            Err(e) => writeln!(out, "kill: {e}"),
        }
    }
}
