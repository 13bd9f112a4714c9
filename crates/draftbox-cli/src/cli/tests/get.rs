//! Tests for the get subcommand.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_get_single() {
    match parse(&["draftbox", "get", "abc-123"]) {
        CliCommand::Get { ids, dest } => {
            assert_eq!(ids, ["abc-123"]);
            assert!(dest.is_none());
        }
        _ => panic!("expected Get"),
    }
}

#[test]
fn cli_parse_get_many_with_dest() {
    match parse(&["draftbox", "get", "a", "b", "c", "--dest", "/tmp/drafts"]) {
        CliCommand::Get { ids, dest } => {
            assert_eq!(ids, ["a", "b", "c"]);
            assert_eq!(dest.as_deref(), Some(std::path::Path::new("/tmp/drafts")));
        }
        _ => panic!("expected Get with --dest"),
    }
}

#[test]
fn cli_parse_get_requires_an_id() {
    assert!(Cli::try_parse_from(["draftbox", "get"]).is_err());
}
