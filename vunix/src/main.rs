use clap::Parser;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

mod demos;
mod shell;
mod vfs;

use shell::{DEFAULT_MAX_STEPS, Shell, ShellConfig};
use vfs::Vfs;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address programs are loaded and started at (decimal or 0x-prefixed hex)
    #[arg(long, default_value = "0", value_parser = parse_u16)]
    origin: u16,

    /// Abort a program after this many instructions
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: u64,

    /// Trace every instruction of every program
    #[arg(short, long)]
    debug: bool,

    /// Import a host file into the filesystem, as NAME=PATH (repeatable)
    #[arg(long = "file", value_name = "NAME=PATH")]
    files: Vec<String>,

    /// Write a core file here when a program faults
    #[arg(long)]
    core_dir: Option<PathBuf>,

    /// Read commands from this file instead of stdin
    #[arg(long)]
    script: Option<PathBuf>,
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address {s:?}: {e}"))
}

fn import(vfs: &mut Vfs, spec: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (name, path) = spec
        .split_once('=')
        .ok_or_else(|| format!("--file expects NAME=PATH, got {spec:?}"))?;
    let content = std::fs::read(path)?;
    log::info!("imported {} ({} bytes) as {}", path, content.len(), name);
    vfs.create(name, content)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut vfs = Vfs::new();
    demos::install(&mut vfs, args.origin)?;
    for spec in &args.files {
        import(&mut vfs, spec)?;
    }

    let config = ShellConfig {
        origin: args.origin,
        max_steps: Some(args.max_steps),
        debug: args.debug,
        core_dir: args.core_dir,
    };
    log::debug!("{:?}", config);
    let mut shell = Shell::new(vfs, config);

    let mut stdout = io::stdout().lock();
    match args.script {
        Some(path) => shell.run(BufReader::new(File::open(path)?), &mut stdout)?,
        None => shell.run(io::stdin().lock(), &mut stdout)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_accept_decimal_and_hex() {
        assert_eq!(parse_u16("512"), Ok(512));
        assert_eq!(parse_u16("0x200"), Ok(0x200));
        assert_eq!(parse_u16("0X3ffc"), Ok(0x3ffc));
        assert!(parse_u16("0x10000").is_err());
        assert!(parse_u16("zero").is_err());
    }

    #[test]
    fn import_requires_name_and_path() {
        let mut vfs = Vfs::new();
        assert!(import(&mut vfs, "no-separator").is_err());
        assert!(import(&mut vfs, "x=/definitely/not/here").is_err());

        let path = std::env::temp_dir().join(format!("vunix-import-{}", std::process::id()));
        std::fs::write(&path, [0u8, 0, 0, 0]).unwrap();
        import(&mut vfs, &format!("halt.out={}", path.display())).unwrap();
        assert_eq!(vfs.open("halt.out").unwrap().content(), &[0, 0, 0, 0]);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn args_parse() {
        let args = Args::parse_from([
            "vunix", "--origin", "0x100", "--max-steps", "50", "-d", "--file", "a=b", "--file", "c=d",
        ]);
        assert_eq!(args.origin, 0x100);
        assert_eq!(args.max_steps, 50);
        assert!(args.debug);
        assert_eq!(args.files, vec!["a=b", "c=d"]);
        assert!(args.script.is_none());
    }

    #[test]
    fn step_budget_is_finite_by_default() {
        let args = Args::parse_from(["vunix"]);
        assert_eq!(args.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(args.origin, 0);
        assert!(!args.debug);
    }
}
