// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Command line surface of the gateway binary: options, config discovery,
//! logging and the store location.

use std::path::{Path, PathBuf};

use anyhow::Context;
use directories_next::ProjectDirs;
use structopt::StructOpt;
use tracing::Level;

use crate::GatewayConfig;

/// Qualifier, organization and application name of the gateway's per-user
/// directories (config and data), used when `--config-dir` is not given.
pub const PACKAGE_ID: [&str; 3] = ["tools", "webb", "tcc-gateway"];

/// Name of the store directory created next to the config directory.
const STORE_DIR: &str = "store";

/// Options of the `tcc-gateway` binary.
///
/// $ tcc-gateway -vvv -c <CONFIG_DIR_PATH>
#[derive(Debug, StructOpt)]
#[structopt(name = "TCC Gateway")]
pub struct Opts {
    /// Log verbosity of the gateway crates: none is errors only, `-vvvv`
    /// is everything.
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: i32,
    /// Directory holding the `*.toml` / `*.json` gateway configuration,
    /// searched recursively.
    #[structopt(
        short = "c",
        long = "config-dir",
        value_name = "PATH",
        parse(from_os_str)
    )]
    pub config_dir: Option<PathBuf>,
    /// Keep cursors and headers in a throwaway store. Every chain is then
    /// synchronized from height zero.
    #[structopt(long)]
    pub tmp: bool,
}

/// Where the cursor and header store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// A temporary directory, removed on exit.
    Temporary,
    /// A sled database at this path.
    Path(PathBuf),
}

fn project_dirs() -> anyhow::Result<ProjectDirs> {
    ProjectDirs::from(PACKAGE_ID[0], PACKAGE_ID[1], PACKAGE_ID[2])
        .context("no home directory to derive the gateway directories from")
}

/// Reads and validates the gateway configuration found in `config_dir`,
/// or in the per-user config directory when none is given.
pub fn load_config<P>(config_dir: Option<P>) -> anyhow::Result<GatewayConfig>
where
    P: AsRef<Path>,
{
    let path = match config_dir {
        Some(p) => p.as_ref().to_path_buf(),
        None => project_dirs()?.config_dir().to_path_buf(),
    };
    if !path.is_dir() {
        anyhow::bail!(
            "gateway config directory {} does not exist",
            path.display()
        );
    }
    tracing::trace!("Loading gateway config from {} ..", path.display());
    let config = crate::utils::load(&path).with_context(|| {
        format!("invalid gateway config in {}", path.display())
    })?;
    tracing::debug!(
        gateway_id = %config.base.gateway_id,
        chains = config.chains.len(),
        mode = %config.base.tx_verify_type,
        "Gateway config loaded",
    );
    Ok(config)
}

/// Maps the number of `-v` flags to a level.
pub fn log_level(verbosity: i32) -> Level {
    match verbosity {
        i32::MIN..=0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Installs the global subscriber.
///
/// Targets starting with `crate_name` (every `tcc_gateway*` crate when
/// given `tcc_gateway`) log at the level chosen by `verbosity`; `RUST_LOG`
/// directives apply to everything else. Output is pretty, or flattened JSON
/// under the `integration-tests` feature so test harnesses can parse it.
pub fn setup_logger(verbosity: i32, crate_name: &str) -> anyhow::Result<()> {
    let log_level = log_level(verbosity);
    let directive = format!("{crate_name}={log_level}")
        .parse::<tracing_subscriber::filter::Directive>()
        .context("invalid log directive")?;
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(directive);
    let logger = tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(log_level)
        .with_env_filter(env_filter);
    #[cfg(not(feature = "integration-tests"))]
    let logger = logger.pretty();
    #[cfg(feature = "integration-tests")]
    let logger = logger.json().flatten_event(true).with_current_span(false);

    logger.init();
    Ok(())
}

/// Resolves the store location.
///
/// `--tmp` wins, then `db-path` from the configuration, then a `store`
/// directory beside the config directory (or in the per-user data directory
/// when no config directory was given).
pub fn store_location(
    opts: &Opts,
    db_path: Option<&Path>,
) -> anyhow::Result<StoreLocation> {
    if opts.tmp {
        return Ok(StoreLocation::Temporary);
    }
    if let Some(path) = db_path {
        return Ok(StoreLocation::Path(path.to_path_buf()));
    }
    let path = match opts.config_dir.as_deref() {
        Some(dir) => match dir.parent() {
            Some(parent) => parent.join(STORE_DIR),
            None => dir.join(STORE_DIR),
        },
        None => project_dirs()?.data_local_dir().join(STORE_DIR),
    };
    Ok(StoreLocation::Path(path))
}

/// Opens the cursor and header store at [`store_location`].
pub fn create_store(
    opts: &Opts,
    config: &GatewayConfig,
) -> anyhow::Result<tcc_gateway_store::SledStore> {
    let store = match store_location(opts, config.db_path.as_deref())? {
        StoreLocation::Temporary => {
            tracing::warn!("Using a temporary store, cursors start at zero");
            tcc_gateway_store::SledStore::temporary()?
        }
        StoreLocation::Path(path) => {
            tracing::debug!("Using {} for store", path.display());
            tcc_gateway_store::SledStore::open(&path).with_context(|| {
                format!("cannot open the gateway store at {}", path.display())
            })?
        }
    };
    Ok(store)
}
