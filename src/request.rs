//! Typed requests for platform adapters
//!
//! Each variant mirrors one bridge method. Adapters build a [`Request`],
//! hand it to [`PDFLocksmith::handle`] and map errors through
//! [`LocksmithError::code`].

use std::path::PathBuf;

use log::debug;

use crate::error::{LocksmithError, LocksmithResult};
use crate::PDFLocksmith;

/// One bridge call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Protect {
        input: PathBuf,
        output: PathBuf,
        password: String,
    },
    ProtectWithPermissions {
        input: PathBuf,
        output: PathBuf,
        user_password: String,
        owner_password: String,
        permissions: Vec<String>,
    },
    Decrypt {
        input: PathBuf,
        output: PathBuf,
        password: String,
    },
    IsEncrypted {
        input: PathBuf,
    },
    RemoveSecurity {
        input: PathBuf,
        output: PathBuf,
        password: String,
    },
}

/// Successful outcome of a [`Request`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Done,
    Encrypted(bool),
}

impl Request {
    /// Bridge method name
    pub fn method(&self) -> &'static str {
        match self {
            Request::Protect { .. } => "protectPdf",
            Request::ProtectWithPermissions { .. } => "protectPdfWithPermissions",
            Request::Decrypt { .. } => "decryptPdf",
            Request::IsEncrypted { .. } => "isPdfEncrypted",
            Request::RemoveSecurity { .. } => "removePdfSecurity",
        }
    }

    /// Reject requests with empty paths
    pub fn validate(&self) -> LocksmithResult<()> {
        let (input, output) = match self {
            Request::Protect { input, output, .. }
            | Request::ProtectWithPermissions { input, output, .. }
            | Request::Decrypt { input, output, .. }
            | Request::RemoveSecurity { input, output, .. } => (input, Some(output)),
            Request::IsEncrypted { input } => (input, None),
        };

        if input.as_os_str().is_empty() {
            return Err(LocksmithError::invalid_arguments(format!(
                "{}: missing input path",
                self.method()
            )));
        }
        if output.map_or(false, |o| o.as_os_str().is_empty()) {
            return Err(LocksmithError::invalid_arguments(format!(
                "{}: missing output path",
                self.method()
            )));
        }
        Ok(())
    }
}

impl PDFLocksmith {
    /// Validate and run one request
    pub fn handle(&self, request: Request) -> LocksmithResult<Response> {
        request.validate()?;
        debug!("Handling {}", request.method());

        match request {
            Request::Protect {
                input,
                output,
                password,
            } => self.protect(input, output, &password).map(|_| Response::Done),
            Request::ProtectWithPermissions {
                input,
                output,
                user_password,
                owner_password,
                permissions,
            } => self
                .protect_with_permissions(input, output, &user_password, &owner_password, &permissions)
                .map(|_| Response::Done),
            Request::Decrypt {
                input,
                output,
                password,
            } => self.decrypt(input, output, &password).map(|_| Response::Done),
            Request::IsEncrypted { input } => self.is_encrypted(input).map(Response::Encrypted),
            Request::RemoveSecurity {
                input,
                output,
                password,
            } => self
                .remove_security(input, output, &password)
                .map(|_| Response::Done),
        }
    }
}
