// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley check` command implementation.

use parley_config::model::ParleyConfig;
use parley_core::traits::{ChannelAdapter, PluginAdapter};

use crate::serve::build_transports;

/// Print a summary of a validated configuration.
///
/// Adapters are constructed but never contacted.
pub fn run_check(config: &ParleyConfig) {
    println!("parley: configuration is valid");
    println!("  database: {}", config.storage.database_path);
    if config.gateway.enabled {
        println!(
            "  gateway:  {}:{} (auth {})",
            config.gateway.host,
            config.gateway.port,
            if config.gateway.bearer_token.is_some() {
                "enabled"
            } else {
                "missing: every /v1 request will be rejected"
            }
        );
    } else {
        println!("  gateway:  disabled");
    }
    println!(
        "  responder: {}",
        config.responder.endpoint.as_deref().unwrap_or("disabled")
    );

    match build_transports(config) {
        Ok(transports) if transports.is_empty() => println!("  channels: none configured"),
        Ok(transports) => {
            println!("  channels:");
            for transport in &transports {
                println!(
                    "    {:<9} {:<10} {}",
                    transport.adapter.channel().to_string(),
                    transport.label,
                    transport.adapter.name()
                );
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
