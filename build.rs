// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Positional argument naming a module (NAME, NAME-VERSION or NAME-VERSION-RELEASE)
fn module_arg(help: &'static str) -> Arg {
    Arg::new("module").required(true).help(help)
}

fn build_cli() -> Command {
    Command::new("modman")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Modman Contributors")
        .about("Manage modules: discover, enable, disable, upgrade and rebase")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .default_value("/etc/modman/modman.toml")
                .help("Configuration file"),
        )
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .value_name("DIR")
                .help("Filesystem root the source descriptors are written under"),
        )
        .arg(
            Arg::new("no_pkg")
                .short('n')
                .long("no-pkg")
                .action(ArgAction::SetTrue)
                .help("Only manage module state, never call the package manager"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(Command::new("list").about("List available modules"))
        .subcommand(
            Command::new("list-enabled")
                .about("List enabled modules")
                .arg(
                    Arg::new("show_requirements")
                        .long("show-requirements")
                        .action(ArgAction::SetTrue)
                        .help("Also show modules enabled only as requirements"),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("Show full information about a module")
                .arg(Arg::new("name").required(true).help("Module name")),
        )
        .subcommand(
            Command::new("enable")
                .about("Enable a module and everything it requires")
                .arg(module_arg("Module to enable"))
                .arg(
                    Arg::new("profile")
                        .long("profile")
                        .action(ArgAction::Append)
                        .help("Profile to install (repeatable)"),
                ),
        )
        .subcommand(
            Command::new("disable")
                .about("Disable a module and modules depending on it")
                .arg(module_arg("Module to disable")),
        )
        .subcommand(
            Command::new("upgrade")
                .about("Upgrade an enabled module to its newest version")
                .arg(module_arg("Module to upgrade")),
        )
        .subcommand(
            Command::new("rebase")
                .about("Switch an enabled module to another version")
                .arg(module_arg("Target NAME-VERSION[-RELEASE]")),
        )
        .subcommand(
            Command::new("search")
                .about("Search available modules")
                .arg(Arg::new("name").long("name").action(ArgAction::Append))
                .arg(Arg::new("version").long("version").num_args(2))
                .arg(Arg::new("release").long("release").num_args(2))
                .arg(Arg::new("requires").long("requires").num_args(2))
                .arg(Arg::new("license").long("license").action(ArgAction::Append))
                .arg(Arg::new("json").long("json")),
        )
        .subcommand(Command::new("refresh").about("Refetch module listings from all sources"))
        .subcommand(Command::new("summary").about("Show counts of available and enabled modules"))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("modman.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
