use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use ioctl_idlc::{load_str, ErrorCode, HasName, IdlError, IoctlIface, Named, Result};

/// Read an ioctl interface definition and report what it declares
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Path to the interface definition
    #[arg(value_name = "FILE")]
    file: PathBuf,
    /// Only validate the definition, printing `OK <name>` on success
    #[arg(long = "check")]
    check: bool,
    /// List the qualified C++ and C names of every named entity
    #[arg(long = "names", conflicts_with = "check")]
    names: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.trace());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let iface = load_file(&cli.file)?;

    if cli.check {
        println!("OK {}", iface.name());
    } else if cli.names {
        for node in iface.named_entities() {
            println!("{}\t{}", node.full_name_cxx(), node.full_name_c());
        }
    } else {
        println!("{:#?}", iface);
    }

    Ok(())
}

fn load_file(path: &Path) -> Result<Rc<IoctlIface>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        IdlError::new(
            ErrorCode::E05001,
            format!("Cannot read {}: {}", path.display(), e),
        )
    })?;
    load_str(&text)
}
