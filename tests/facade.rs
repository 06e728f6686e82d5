mod common;

use std::fs;

use pdf_locksmith::{
    EncryptionAlgorithm, LocksmithError, PDFLocksmith, PDFPermissions, ProtectOptions, Request,
    Response,
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use common::{pageless_pdf, readable_parts, sample_pdf, write_sample, PAGE_CONTENT, TITLE};

#[test_log::test]
fn test_protect_and_decrypt_files() -> Result<(), LocksmithError> {
    let dir = tempdir()?;
    let input = write_sample(dir.path(), "plain.pdf");
    let locked = dir.path().join("locked.pdf");
    let opened = dir.path().join("opened.pdf");
    let locksmith = PDFLocksmith::new();

    locksmith.protect(&input, &locked, "hunter2")?;
    assert!(locksmith.is_encrypted(&locked)?);
    assert!(!locksmith.is_encrypted(&input)?);

    let (content, title) = readable_parts(&fs::read(&locked)?);
    assert_ne!(content, PAGE_CONTENT.to_vec());
    assert_ne!(title, TITLE.to_vec());

    locksmith.decrypt(&locked, &opened, "hunter2")?;
    assert!(!locksmith.is_encrypted(&opened)?);
    let (content, title) = readable_parts(&fs::read(&opened)?);
    assert_eq!(content, PAGE_CONTENT.to_vec());
    assert_eq!(title, TITLE.to_vec());
    Ok(())
}

#[test_log::test]
fn test_default_protection_parameters() -> Result<(), LocksmithError> {
    let dir = tempdir()?;
    let input = write_sample(dir.path(), "plain.pdf");
    let locked = dir.path().join("locked.pdf");
    let locksmith = PDFLocksmith::new();

    locksmith.protect(&input, &locked, "pw")?;
    let info = locksmith.encryption_info(&locked)?.expect("encryption info");
    assert_eq!(info.algorithm, EncryptionAlgorithm::Aes128);
    assert_eq!((info.version, info.revision, info.key_bits), (4, 4, 128));
    assert_eq!(info.permissions, PDFPermissions::default());
    Ok(())
}

#[test_log::test]
fn test_permissions_are_recorded() -> Result<(), LocksmithError> {
    let dir = tempdir()?;
    let input = write_sample(dir.path(), "plain.pdf");
    let locked = dir.path().join("locked.pdf");
    let locksmith = PDFLocksmith::new();

    locksmith.protect_with_permissions(&input, &locked, "", "owner", &["print", "fillForms", "bogus"])?;
    let info = locksmith.encryption_info(&locked)?.expect("encryption info");
    assert_eq!(
        info.permissions.bits(),
        PDFPermissions::PRINT | PDFPermissions::FILL_FORMS
    );

    // An empty user password opens the document
    let opened = dir.path().join("opened.pdf");
    locksmith.decrypt(&locked, &opened, "")?;
    assert_eq!(readable_parts(&fs::read(&opened)?).0, PAGE_CONTENT.to_vec());
    Ok(())
}

#[test_log::test]
fn test_empty_permission_list_uses_defaults() -> Result<(), LocksmithError> {
    let dir = tempdir()?;
    let input = write_sample(dir.path(), "plain.pdf");
    let locked = dir.path().join("locked.pdf");
    let locksmith = PDFLocksmith::new();

    locksmith.protect_with_permissions::<&str>(&input, &locked, "u", "o", &[])?;
    let info = locksmith.encryption_info(&locked)?.expect("encryption info");
    assert_eq!(info.permissions, PDFPermissions::default());
    Ok(())
}

#[test_log::test]
fn test_owner_password_removes_security() -> Result<(), LocksmithError> {
    let dir = tempdir()?;
    let input = write_sample(dir.path(), "plain.pdf");
    let locked = dir.path().join("locked.pdf");
    let opened = dir.path().join("opened.pdf");
    let locksmith = PDFLocksmith::new();

    locksmith.protect_with_permissions::<&str>(&input, &locked, "user", "owner", &[])?;
    locksmith.remove_security(&locked, &opened, "owner")?;
    assert!(!locksmith.is_encrypted(&opened)?);
    Ok(())
}

#[test_log::test]
fn test_wrong_password() -> Result<(), LocksmithError> {
    let dir = tempdir()?;
    let input = write_sample(dir.path(), "plain.pdf");
    let locked = dir.path().join("locked.pdf");
    let opened = dir.path().join("opened.pdf");
    let locksmith = PDFLocksmith::new();

    locksmith.protect(&input, &locked, "right")?;
    let err = locksmith.decrypt(&locked, &opened, "wrong").unwrap_err();
    assert!(matches!(err, LocksmithError::WrongPassword));
    assert_eq!(err.code(), "WRONG_PASSWORD");
    assert!(!opened.exists());
    Ok(())
}

#[test_log::test]
fn test_already_encrypted_guard() -> Result<(), LocksmithError> {
    let dir = tempdir()?;
    let input = write_sample(dir.path(), "plain.pdf");
    let locked = dir.path().join("locked.pdf");
    let relocked = dir.path().join("relocked.pdf");
    let locksmith = PDFLocksmith::new();

    locksmith.protect(&input, &locked, "first")?;
    let err = locksmith.protect(&locked, &relocked, "second").unwrap_err();
    assert_eq!(err.code(), "ALREADY_ENCRYPTED");
    assert!(!relocked.exists());

    // Knowing the current password allows re-protection
    locksmith.protect_with_permissions::<&str>(&locked, &relocked, "first", "second", &[])?;
    let opened = dir.path().join("opened.pdf");
    locksmith.decrypt(&relocked, &opened, "second")?;
    assert_eq!(readable_parts(&fs::read(&opened)?).0, PAGE_CONTENT.to_vec());
    Ok(())
}

#[test_log::test]
fn test_is_encrypted_does_not_modify_file() -> Result<(), LocksmithError> {
    let dir = tempdir()?;
    let input = write_sample(dir.path(), "plain.pdf");
    let locked = dir.path().join("locked.pdf");
    let locksmith = PDFLocksmith::new();
    locksmith.protect(&input, &locked, "pw")?;

    let before = fs::read(&locked)?;
    assert!(locksmith.is_encrypted(&locked)?);
    assert!(locksmith.is_encrypted(&locked)?);
    assert_eq!(fs::read(&locked)?, before);
    Ok(())
}

#[test_log::test]
fn test_decrypting_plain_file_writes_copy() -> Result<(), LocksmithError> {
    let dir = tempdir()?;
    let input = write_sample(dir.path(), "plain.pdf");
    let output = dir.path().join("copy.pdf");
    let locksmith = PDFLocksmith::new();

    locksmith.decrypt(&input, &output, "irrelevant")?;
    assert!(!locksmith.is_encrypted(&output)?);
    assert_eq!(readable_parts(&fs::read(&output)?).0, PAGE_CONTENT.to_vec());
    Ok(())
}

#[test_log::test]
fn test_pageless_document_is_invalid() -> Result<(), LocksmithError> {
    let dir = tempdir()?;
    let input = dir.path().join("empty.pdf");
    fs::write(&input, pageless_pdf())?;

    let err = PDFLocksmith::new()
        .protect(&input, dir.path().join("out.pdf"), "pw")
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_PDF");
    Ok(())
}

#[test_log::test]
fn test_file_system_errors() -> Result<(), LocksmithError> {
    let dir = tempdir()?;
    let locksmith = PDFLocksmith::new();

    let missing = dir.path().join("missing.pdf");
    let err = locksmith.is_encrypted(&missing).unwrap_err();
    assert_eq!(err.code(), "FILE_NOT_FOUND");

    let not_pdf = dir.path().join("notes.txt");
    fs::write(&not_pdf, b"just some text")?;
    let err = locksmith.protect(&not_pdf, dir.path().join("out.pdf"), "pw").unwrap_err();
    assert_eq!(err.code(), "LOAD_FAILED");

    let input = write_sample(dir.path(), "plain.pdf");
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, b"file in the way")?;
    let err = locksmith
        .protect(&input, blocker.join("sub").join("out.pdf"), "pw")
        .unwrap_err();
    assert_eq!(err.code(), "CREATE_DIRECTORY_FAILED");
    Ok(())
}

#[test_log::test]
fn test_output_directories_are_created() -> Result<(), LocksmithError> {
    let dir = tempdir()?;
    let input = write_sample(dir.path(), "plain.pdf");
    let output = dir.path().join("a").join("b").join("locked.pdf");

    PDFLocksmith::new().protect(&input, &output, "pw")?;
    assert!(output.exists());
    Ok(())
}

#[test_log::test]
fn test_in_place_protection() -> Result<(), LocksmithError> {
    let dir = tempdir()?;
    let path = write_sample(dir.path(), "report.pdf");
    let locksmith = PDFLocksmith::new();

    locksmith.protect(&path, &path, "pw")?;
    assert!(locksmith.is_encrypted(&path)?);
    locksmith.decrypt(&path, &path, "pw")?;
    assert!(!locksmith.is_encrypted(&path)?);
    Ok(())
}

#[test_log::test]
fn test_request_dispatch() -> Result<(), LocksmithError> {
    let dir = tempdir()?;
    let input = write_sample(dir.path(), "plain.pdf");
    let locked = dir.path().join("locked.pdf");
    let locksmith = PDFLocksmith::with_options(ProtectOptions {
        algorithm: EncryptionAlgorithm::Aes256,
        ..ProtectOptions::default()
    });

    let response = locksmith.handle(Request::ProtectWithPermissions {
        input: input.clone(),
        output: locked.clone(),
        user_password: "u".into(),
        owner_password: "o".into(),
        permissions: vec!["copy".into()],
    })?;
    assert_eq!(response, Response::Done);

    let response = locksmith.handle(Request::IsEncrypted { input: locked.clone() })?;
    assert_eq!(response, Response::Encrypted(true));

    let err = locksmith
        .handle(Request::IsEncrypted {
            input: Default::default(),
        })
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_ARGUMENTS");
    Ok(())
}

#[test_log::test]
fn test_bytes_api_matches_files() -> Result<(), LocksmithError> {
    let locksmith = PDFLocksmith::new();
    let protected = locksmith.protect_bytes(&sample_pdf(), "a", "b", PDFPermissions::default())?;
    assert!(locksmith.is_encrypted_bytes(&protected)?);
    let opened = locksmith.decrypt_bytes(&protected, "b")?;
    assert_eq!(readable_parts(&opened).0, PAGE_CONTENT.to_vec());
    Ok(())
}
