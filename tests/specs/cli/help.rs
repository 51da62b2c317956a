//! CLI help output specs

use crate::prelude::*;

#[test]
fn lk_no_args_shows_usage_and_exits_two() {
    cli().fails_with(2).stderr_has("Usage:");
}

#[test]
fn lk_help_lists_commands() {
    cli()
        .args(&["--help"])
        .passes()
        .stdout_has("Usage:")
        .stdout_has("lock")
        .stdout_has("complete")
        .stdout_has("recover")
        .stdout_has("spawn");
}

#[test]
fn lk_lock_help_shows_subcommands() {
    cli()
        .args(&["lock", "--help"])
        .passes()
        .stdout_has("acquire")
        .stdout_has("release")
        .stdout_has("list")
        .stdout_has("unlock");
}

#[test]
fn lk_recover_run_help_mentions_force() {
    cli().args(&["recover", "run", "--help"]).passes().stdout_has("--force");
}

#[test]
fn lk_version_shows_version() {
    cli().args(&["--version"]).passes().stdout_has("0.1");
}

#[test]
fn unknown_resource_is_a_usage_error() {
    cli().args(&["lock", "acquire", "bogus", "--owner", "WU-1"]).fails_with(2).stderr_has("bogus");
}
