//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::PathBuf;

use clap::{ArgMatches, value_t};
use itertools::Itertools;
use ncpush_client::{
    Datastore, EditResult, FileSource, Filter, PayloadSource, PushOptions,
    PushReport, Pusher, Result, Session, SshTransport, Target,
    TransactionReport, iosxe,
};
use prettytable::{Table, format, row};
use serde::Serialize;
use tracing::info;

use crate::config::Config;

// ===== "push" =====

pub(crate) fn cmd_push(config: &Config, matches: &ArgMatches<'_>) -> Result<bool> {
    let mut options: PushOptions = config.push.clone();
    if matches.is_present("target") {
        let target =
            value_t!(matches, "target", Target).unwrap_or_else(|e| e.exit());
        options.target = Some(target);
    }
    if matches.is_present("save") {
        options.save_config = true;
    }

    // Read and validate all payloads before connecting.
    let paths = matches
        .values_of("files")
        .into_iter()
        .flatten()
        .map(PathBuf::from)
        .collect();
    let mut payloads = FileSource::new(paths).payloads()?;
    info!(count = payloads.len(), "payloads loaded");

    let transport = SshTransport::connect(&config.device)?;
    let report = match Pusher::new(options).push(
        &config.device.host,
        transport,
        &mut payloads,
    ) {
        Ok(report) => report,
        Err(error) => {
            // Show what was submitted before the failure.
            if let Some(report) = error.report() {
                if matches.is_present("json") {
                    print_json(report);
                } else {
                    print_transaction(report);
                }
            }
            return Err(error);
        }
    };

    if matches.is_present("json") {
        print_json(&report);
    } else {
        print_report(&report);
    }

    Ok(report.transaction.is_committed())
}

fn print_report(report: &PushReport) {
    match report.session_id {
        Some(session_id) => {
            println!(" Host: {} (session {})", report.host, session_id)
        }
        None => println!(" Host: {}", report.host),
    }
    println!(" Saved: {}", if report.saved { "yes" } else { "no" });
    print_transaction(&report.transaction);
}

fn print_transaction(transaction: &TransactionReport) {
    println!(" Target: {}", transaction.target);
    println!(" Outcome: {}", transaction.outcome);
    println!();

    if !transaction.results.is_empty() {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.set_titles(row!["#", "Result", "Details"]);
        for (index, result) in transaction.results.iter().enumerate() {
            match result {
                EditResult::Accepted => {
                    table.add_row(row![index + 1, "accepted", "-"]);
                }
                EditResult::Rejected(rejection) => {
                    table.add_row(row![index + 1, "rejected", rejection]);
                }
            }
        }
        table.printstd();
        println!();
    }

    if !transaction.finalize_errors.is_empty() {
        println!(" Commit rejected:");
        for error in &transaction.finalize_errors {
            println!("   {}", error);
        }
        println!();
    }
}

// ===== "get-config" =====

pub(crate) fn cmd_get_config(
    config: &Config,
    matches: &ArgMatches<'_>,
) -> Result<bool> {
    let source = if matches.is_present("source") {
        value_t!(matches, "source", Datastore).unwrap_or_else(|e| e.exit())
    } else {
        Datastore::default()
    };
    let filter = match matches.value_of("xpath") {
        // Absolute paths are used as is.
        Some(xpath) if xpath.starts_with('/') => {
            Some(Filter::Xpath(xpath.to_owned()))
        }
        Some(path) => Some(iosxe::native_xpath(path)?),
        None => None,
    };

    let mut session = open_session(config)?;
    let data = session.get_config(source, filter.as_ref())?;
    session.close()?;

    println!("{}", data);
    Ok(true)
}

// ===== "capabilities" =====

pub(crate) fn cmd_capabilities(
    config: &Config,
    matches: &ArgMatches<'_>,
) -> Result<bool> {
    let mut session = open_session(config)?;
    let capabilities = session.capabilities()?.clone();
    let session_id = session.session_id();
    session.close()?;

    if matches.is_present("json") {
        print_json(&capabilities);
        return Ok(true);
    }

    if let Some(session_id) = session_id {
        println!(" Session: {}", session_id);
    }
    let editable = [Target::Candidate, Target::Running]
        .into_iter()
        .filter(|target| capabilities.supports(*target))
        .join(", ");
    if editable.is_empty() {
        println!(" Editable datastores: none");
    } else {
        println!(" Editable datastores: {}", editable);
    }
    println!();

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(row!["Capability"]);
    for capability in capabilities.iter() {
        table.add_row(row![capability]);
    }
    table.printstd();
    println!();

    Ok(true)
}

// ===== "save-config" =====

pub(crate) fn cmd_save_config(config: &Config) -> Result<bool> {
    let mut session = open_session(config)?;
    iosxe::save_config(&mut session)?;
    session.close()?;

    println!(" Running configuration saved to startup.");
    Ok(true)
}

// ===== helper functions =====

fn open_session(config: &Config) -> Result<Session<SshTransport>> {
    let transport = SshTransport::connect(&config.device)?;
    Session::open(&config.device.host, transport)
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(error) => eprintln!("% failed to encode report: {}", error),
    }
}
