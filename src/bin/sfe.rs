//! sfe CLI - Password-based file encryption
//!
//! Command-line interface for encrypting files into sfe containers and
//! getting them back, name and MIME type included.

use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use sfe::file_ops::{self, EncryptOptions};
use sfe::passphrase::{PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader};
use sfe::{Algorithm, Result};

/// Environment variable holding a tracing filter directive, e.g. `sfe=debug`.
const LOG_ENV: &str = "SFE_LOG";

#[derive(Parser)]
#[command(name = "sfe")]
#[command(version)]
#[command(about = "Password-based file encryption.", long_about = None)]
struct Cli {
    /// Read password from stdin instead of from terminal. Every byte read
    /// is used, including any trailing newline
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Log pipeline steps to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt one or more files
    #[command(alias = "e")]
    Encrypt {
        /// Files whose contents are to be encrypted
        #[arg(short, long, value_name = "FILE", required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Directory to write `<name>.sfe` files to (default: next to each input)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Cipher: `authenticated` (AES-256-GCM) or `unauthenticated`
        /// (AES-256-CBC, no tamper detection)
        #[arg(short, long, default_value = "authenticated")]
        algorithm: Algorithm,

        /// MIME type to record instead of guessing from the extension
        #[arg(long)]
        mime: Option<String>,
    },

    /// Decrypt one or more containers
    #[command(alias = "d")]
    Decrypt {
        /// Containers to decrypt
        #[arg(short, long, value_name = "FILE", required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Directory to write recovered files to (default: next to each input).
        /// Existing files are never overwritten
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Show a container's header without decrypting it
    #[command(alias = "i")]
    Inspect {
        /// Container to inspect
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Encrypt {
            input,
            output_dir,
            algorithm,
            mime,
        } => {
            let options = EncryptOptions {
                algorithm,
                mime_override: mime,
                output_dir,
            };
            let mut reader = get_passphrase_reader(cli.passphrase_stdin, true);
            file_ops::encrypt_files(&input, &options, &mut *reader).and_then(report)
        }
        Commands::Decrypt { input, output_dir } => {
            let mut reader = get_passphrase_reader(cli.passphrase_stdin, false);
            file_ops::decrypt_files(&input, output_dir.as_deref(), &mut *reader).and_then(report)
        }
        Commands::Inspect { input } => file_ops::inspect_path(&input).map(|info| {
            println!("version:    {}", info.version);
            println!("algorithm:  {}", info.algorithm);
            println!("name:       {}", info.name);
            println!("mime:       {}", info.mime);
            println!("header:     {} bytes", info.header_len);
            println!("ciphertext: {} bytes", info.ciphertext_len);
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", render(&e));
        process::exit(1);
    }
}

/// Print each output path; fail if any single file failed.
fn report(results: Vec<Result<PathBuf>>) -> Result<()> {
    let mut failed = 0usize;
    for result in results {
        match result {
            Ok(path) => println!("{}", path.display()),
            Err(e) => {
                eprintln!("Error: {}", render(&e));
                failed += 1;
            }
        }
    }
    if failed > 0 {
        return Err(sfe::SfeError::new(
            sfe::ErrorCategory::User,
            format!("{} file(s) failed", failed),
        ));
    }
    Ok(())
}

/// Message plus the chain of sources, `outer: inner: innermost`.
fn render(err: &sfe::SfeError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("sfe=debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn get_passphrase_reader(use_stdin: bool, confirm: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(TerminalPassphraseReader::new(confirm))
    }
}
