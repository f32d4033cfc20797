mod common;

use assert_cmd::prelude::*;
use eyre::Result;
use predicates::prelude::*;
use std::path::Path;
use std::process::Command;
use tempfile::{TempDir, tempdir};

fn book_dir() -> Result<TempDir> {
    let dir = tempdir()?;
    std::fs::write(dir.path().join("book.epub"), common::three_chapter_book())?;
    Ok(dir)
}

fn quire(dir: &Path) -> Result<Command> {
    let mut cmd = Command::cargo_bin("quire")?;
    cmd.current_dir(dir)
        .arg("-c")
        .arg(dir.join("configuration.json"));
    Ok(cmd)
}

#[test]
fn test_dump_prints_package_json() -> Result<()> {
    let dir = book_dir()?;
    quire(dir.path())?
        .args(["--dump", "book.epub"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"title\": \"Three Chapters\""))
        .stdout(predicate::str::contains("\"label\": \"Middle\""));
    Ok(())
}

#[test]
fn test_cover_prints_href() -> Result<()> {
    let dir = book_dir()?;
    quire(dir.path())?
        .args(["--cover", "book.epub"])
        .assert()
        .success()
        .stdout(predicate::str::contains("images/cover.png"));
    Ok(())
}

#[test]
fn test_pages_walks_the_whole_book() -> Result<()> {
    let dir = book_dir()?;
    let output = quire(dir.path())?
        .args(["--pages", "--size", "120x130", "book.epub"])
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert_eq!(stdout.lines().count(), 9);
    assert!(stdout.contains("chapter 2/3 page 2/2 50.00% epubcfi(/6/4!/4/55)"));
    assert!(stdout.lines().last().is_some_and(|line| line.starts_with("chapter 3/3 page 6/6")));
    Ok(())
}

#[test]
fn test_cfi_opens_the_matching_page() -> Result<()> {
    let dir = book_dir()?;
    quire(dir.path())?
        .args(["--size", "120x130", "--cfi", "epubcfi(/6/6!/4/165)", "book.epub"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("chapter 3/3 page 4/6"));
    Ok(())
}

#[test]
fn test_note_renders_markdown() -> Result<()> {
    let dir = tempdir()?;
    std::fs::write(dir.path().join("note.md"), "Title\n- [ ] **buy** milk")?;
    quire(dir.path())?
        .args(["--note", "note.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<strong"))
        .stdout(predicate::str::contains("type=\"checkbox\""));
    Ok(())
}

#[test]
fn test_missing_file_fails() -> Result<()> {
    let dir = tempdir()?;
    quire(dir.path())?.assert().failure();
    quire(dir.path())?.arg("absent.epub").assert().failure();
    Ok(())
}

#[test]
fn test_bad_size_is_rejected() -> Result<()> {
    let dir = book_dir()?;
    quire(dir.path())?
        .args(["--size", "wide", "book.epub"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("WxH").or(predicate::str::contains("WIDTHxHEIGHT")));
    Ok(())
}

#[test]
fn test_missing_config_is_created() -> Result<()> {
    let dir = book_dir()?;
    quire(dir.path())?.arg("book.epub").assert().success();
    assert!(dir.path().join("configuration.json").exists());
    Ok(())
}
