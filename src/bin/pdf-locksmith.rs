use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use pdf_locksmith::{
    EncryptionAlgorithm, LocksmithError, PDFLocksmith, PDFPermissions, ProtectOptions, Request,
    Response,
};

#[derive(Parser)]
#[command(
    name = "pdf-locksmith",
    about = "Apply and remove PDF password protection",
    version
)]
struct Cli {
    /// Cipher used when protecting
    #[arg(short, long, value_enum, global = true, default_value = "aes128")]
    algorithm: AlgorithmArg,

    /// Leave XMP metadata streams unencrypted
    #[arg(long, global = true)]
    plain_metadata: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum AlgorithmArg {
    Rc4_40,
    Rc4_128,
    Aes128,
    Aes256,
}

impl From<AlgorithmArg> for EncryptionAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Rc4_40 => EncryptionAlgorithm::Rc4_40,
            AlgorithmArg::Rc4_128 => EncryptionAlgorithm::Rc4_128,
            AlgorithmArg::Aes128 => EncryptionAlgorithm::Aes128,
            AlgorithmArg::Aes256 => EncryptionAlgorithm::Aes256,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Protect a PDF using one password as user and owner password
    Protect {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long)]
        password: String,
    },

    /// Protect a PDF with separate passwords and explicit permissions
    ProtectWithPermissions {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long, default_value = "")]
        user_password: String,
        #[arg(short, long)]
        owner_password: String,
        /// Granted capability, repeatable (print, copy, modify, annotate,
        /// fillForms, extract, assemble, printHighQuality)
        #[arg(long = "permission")]
        permissions: Vec<String>,
    },

    /// Remove protection using the user or owner password
    Decrypt {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long, default_value = "")]
        password: String,
    },

    /// Same as decrypt
    RemoveSecurity {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long, default_value = "")]
        password: String,
    },

    /// Report whether a PDF is encrypted
    IsEncrypted { input: PathBuf },

    /// Show the encryption parameters of a PDF
    Info { input: PathBuf },
}

fn run(cli: Cli) -> Result<(), LocksmithError> {
    let locksmith = PDFLocksmith::with_options(ProtectOptions {
        algorithm: cli.algorithm.into(),
        permissions: PDFPermissions::default(),
        encrypt_metadata: !cli.plain_metadata,
    });

    let request = match cli.command {
        Commands::Protect {
            input,
            output,
            password,
        } => Request::Protect {
            input,
            output,
            password,
        },
        Commands::ProtectWithPermissions {
            input,
            output,
            user_password,
            owner_password,
            permissions,
        } => Request::ProtectWithPermissions {
            input,
            output,
            user_password,
            owner_password,
            permissions,
        },
        Commands::Decrypt {
            input,
            output,
            password,
        } => Request::Decrypt {
            input,
            output,
            password,
        },
        Commands::RemoveSecurity {
            input,
            output,
            password,
        } => Request::RemoveSecurity {
            input,
            output,
            password,
        },
        Commands::IsEncrypted { input } => Request::IsEncrypted { input },
        Commands::Info { input } => {
            match locksmith.encryption_info(&input)? {
                Some(info) => {
                    println!("Encrypted:   yes");
                    println!("Algorithm:   {}", info.algorithm);
                    println!("Handler:     V{} R{}", info.version, info.revision);
                    println!("Key length:  {} bits", info.key_bits);
                    println!("Permissions: {}", info.permissions);
                    println!("Metadata:    {}", if info.encrypt_metadata { "encrypted" } else { "plain" });
                }
                None => println!("Encrypted:   no"),
            }
            return Ok(());
        }
    };

    match locksmith.handle(request)? {
        Response::Encrypted(encrypted) => println!("{}", encrypted),
        Response::Done => println!("Done"),
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error[{}]: {}", e.code(), e);
            ExitCode::FAILURE
        }
    }
}
