//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod commands;
mod config;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand, value_t};
use config::{Config, LoggingFileRotation, LoggingFmtStyle};
use ncpush_client::Auth;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::prelude::*;

// Exit codes.
const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_NOT_COMMITTED: i32 = 2;

fn init_tracing(config: &config::Logging) {
    // Enable logging to a file.
    let file = config.file.enabled.then(|| {
        let file_appender = match config.file.rotation {
            LoggingFileRotation::Never => {
                rolling::never(&config.file.dir, &config.file.name)
            }
            LoggingFileRotation::Hourly => {
                rolling::hourly(&config.file.dir, &config.file.name)
            }
            LoggingFileRotation::Daily => {
                rolling::daily(&config.file.dir, &config.file.name)
            }
        };

        let log_level_filter = LevelFilter::from_level(tracing::Level::TRACE);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(false)
            .with_thread_ids(config.file.fmt.show_thread_id)
            .with_file(config.file.fmt.show_source)
            .with_line_number(config.file.fmt.show_source)
            .with_ansi(config.file.fmt.colors);
        let layer = match config.file.fmt.style {
            LoggingFmtStyle::Compact => layer.compact().boxed(),
            LoggingFmtStyle::Full => layer.boxed(),
            LoggingFmtStyle::Json => layer.json().boxed(),
            LoggingFmtStyle::Pretty => layer.pretty().boxed(),
        };
        layer.with_filter(log_level_filter)
    });

    // Enable logging to stderr. Stdout is reserved for command output.
    let stderr = config.stderr.enabled.then(|| {
        let log_level_filter = LevelFilter::from(config.stderr.level);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(config.stderr.fmt.show_thread_id)
            .with_file(config.stderr.fmt.show_source)
            .with_line_number(config.stderr.fmt.show_source)
            .with_ansi(config.stderr.fmt.colors);
        let layer = match config.stderr.fmt.style {
            LoggingFmtStyle::Compact => layer.compact().boxed(),
            LoggingFmtStyle::Full => layer.boxed(),
            LoggingFmtStyle::Json => layer.json().boxed(),
            LoggingFmtStyle::Pretty => layer.pretty().boxed(),
        };
        layer.with_filter(log_level_filter)
    });

    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(
            "ncpush=debug"
                .parse()
                .unwrap_or_else(|_| LevelFilter::INFO.into()),
        )
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(file)
        .with(stderr)
        .init();
}

// Applies the command-line overrides on top of the configuration file.
fn apply_overrides(config: &mut Config, matches: &ArgMatches<'_>) {
    if let Some(host) = matches.value_of("host") {
        config.device.host = host.to_owned();
    }
    if matches.is_present("port") {
        config.device.port =
            value_t!(matches, "port", u16).unwrap_or_else(|e| e.exit());
    }
    if let Some(username) = matches.value_of("username") {
        config.device.username = username.to_owned();
    }
    if let Some(password) = matches.value_of("password") {
        config.device.auth = Auth::Password {
            password: password.to_owned(),
        };
    }
}

fn build_version() -> String {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    match rustc_tools_util::get_version_info!().commit_hash {
        Some(hash) => format!("{VERSION} ({hash})"),
        None => VERSION.to_owned(),
    }
}

// ===== main =====

fn main() {
    // Parse command-line parameters.
    let matches = App::new("NETCONF configuration pusher")
        .version(build_version().as_str())
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("file")
                .help("Specify an alternative configuration file."),
        )
        .arg(
            Arg::with_name("host")
                .long("host")
                .value_name("HOST")
                .help("Device hostname or address"),
        )
        .arg(
            Arg::with_name("port")
                .long("port")
                .value_name("PORT")
                .help("Device NETCONF port"),
        )
        .arg(
            Arg::with_name("username")
                .short("u")
                .long("username")
                .value_name("USER")
                .help("SSH username"),
        )
        .arg(
            Arg::with_name("password")
                .long("password")
                .value_name("PASSWORD")
                .help("SSH password (overrides the configured authentication)"),
        )
        .subcommand(
            SubCommand::with_name("push")
                .about("Apply configuration payloads inside a locked transaction")
                .arg(
                    Arg::with_name("files")
                        .value_name("FILE")
                        .help("XML payload files, applied in order")
                        .required(true)
                        .multiple(true),
                )
                .arg(
                    Arg::with_name("target")
                        .short("t")
                        .long("target")
                        .value_name("DATASTORE")
                        .possible_values(&["candidate", "running"])
                        .help("Force the target datastore"),
                )
                .arg(
                    Arg::with_name("save")
                        .long("save")
                        .help("Save the running configuration after a commit"),
                )
                .arg(
                    Arg::with_name("json")
                        .long("json")
                        .help("Print the report as JSON"),
                ),
        )
        .subcommand(
            SubCommand::with_name("get-config")
                .about("Retrieve configuration data")
                .arg(
                    Arg::with_name("xpath")
                        .value_name("XPATH")
                        .help("XPath filter, relative to /native unless absolute"),
                )
                .arg(
                    Arg::with_name("source")
                        .short("s")
                        .long("source")
                        .value_name("DATASTORE")
                        .possible_values(&["running", "candidate", "startup"])
                        .help("Source datastore"),
                ),
        )
        .subcommand(
            SubCommand::with_name("capabilities")
                .about("Show the capabilities advertised by the device")
                .arg(
                    Arg::with_name("json")
                        .long("json")
                        .help("Print the capabilities as JSON"),
                ),
        )
        .subcommand(
            SubCommand::with_name("save-config")
                .about("Copy the running configuration to startup"),
        )
        .get_matches();

    // Read configuration file.
    let mut config = match Config::load(matches.value_of("config")) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("% failed to load configuration file: {}", error);
            std::process::exit(EXIT_FAILURE);
        }
    };
    apply_overrides(&mut config, &matches);

    // Initialize tracing.
    init_tracing(&config.logging);

    let result = match matches.subcommand() {
        ("push", Some(matches)) => commands::cmd_push(&config, matches),
        ("get-config", Some(matches)) => {
            commands::cmd_get_config(&config, matches)
        }
        ("capabilities", Some(matches)) => {
            commands::cmd_capabilities(&config, matches)
        }
        ("save-config", Some(_)) => commands::cmd_save_config(&config),
        _ => {
            eprintln!("{}", matches.usage());
            std::process::exit(EXIT_FAILURE);
        }
    };

    let code = match result {
        Ok(true) => EXIT_SUCCESS,
        Ok(false) => EXIT_NOT_COMMITTED,
        Err(error) => {
            error.log();
            eprintln!("% {}", error);
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}
