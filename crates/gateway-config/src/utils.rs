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

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use config::{Config, File};
use tcc_gateway_utils::Error;

use crate::GatewayConfig;

/// Environment variables with this prefix override file values.
pub const ENV_PREFIX: &str = "TCC_GATEWAY";

/// A helper function that will search for all config files in the given directory and return them as a vec
/// of the paths.
///
/// Supported file extensions are:
/// - `.toml`.
/// - `.json`.
pub fn search_config_files<P: AsRef<Path>>(
    base_dir: P,
) -> tcc_gateway_utils::Result<Vec<PathBuf>> {
    // A pattern that covers all toml or json files in the config directory and subdirectories.
    let toml_pattern = format!("{}/**/*.toml", base_dir.as_ref().display());
    let json_pattern = format!("{}/**/*.json", base_dir.as_ref().display());
    tracing::trace!(
        "Loading config files from {} and {}",
        toml_pattern,
        json_pattern
    );
    let toml_files = glob::glob(&toml_pattern)?;
    let json_files = glob::glob(&json_pattern)?;
    toml_files
        .chain(json_files)
        .map(|v| v.map_err(Error::from))
        .collect()
}

/// Try to parse the [`GatewayConfig`] from the given config file(s).
pub fn parse_from_files(
    files: &[PathBuf],
) -> tcc_gateway_utils::Result<GatewayConfig> {
    let mut builder = Config::builder();
    for config_file in files {
        tracing::trace!("Loading config file: {}", config_file.display());
        let ext = config_file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let format = match ext {
            "toml" => config::FileFormat::Toml,
            "json" => config::FileFormat::Json,
            _ => {
                tracing::warn!("Unknown file extension: {}", ext);
                continue;
            }
        };
        builder = builder
            .add_source(File::from(config_file.as_path()).format(format));
    }

    // also merge in the environment (with a prefix of TCC_GATEWAY).
    let builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX).separator("_"),
    );
    let cfg = builder.build()?;
    // and finally deserialize the config and post-process it
    let config: Result<
        GatewayConfig,
        serde_path_to_error::Error<config::ConfigError>,
    > = serde_path_to_error::deserialize(cfg);
    match config {
        Ok(c) => postloading_process(c),
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}

/// Load the configuration files from `path`.
///
/// it is the same as using the [`search_config_files`] and [`parse_from_files`] functions combined.
pub fn load<P: AsRef<Path>>(
    path: P,
) -> tcc_gateway_utils::Result<GatewayConfig> {
    parse_from_files(&search_config_files(path)?)
}

/// The postloading_process exists to validate configuration and standardize
/// the format of the configuration
pub fn postloading_process(
    mut config: GatewayConfig,
) -> tcc_gateway_utils::Result<GatewayConfig> {
    tracing::trace!("Checking configration sanity ...");

    if config.base.gateway_id.trim().is_empty() {
        return Err(Error::InvalidConfig("base.gateway-id is required".into()));
    }
    if config.block_header_sync.batch_count == 0 {
        return Err(Error::InvalidConfig(
            "block-header-sync.batch-count must be greater than zero".into(),
        ));
    }
    if config.block_header_sync.interval == 0 {
        return Err(Error::InvalidConfig(
            "block-header-sync.interval must be greater than zero".into(),
        ));
    }
    if config.dispatch.max_in_flight == 0 || config.dispatch.queue_size == 0 {
        return Err(Error::InvalidConfig(
            "dispatch.queue-size and dispatch.max-in-flight must be greater than zero"
                .into(),
        ));
    }

    // 1. drain everything, and take enabled chains.
    let enabled = config
        .chains
        .drain()
        .filter(|(name, chain)| {
            if !chain.enabled {
                tracing::debug!(%name, "chain is disabled, skipping");
            }
            chain.enabled
        })
        .collect::<HashMap<_, _>>();
    // 2. insert them again, keyed by their resource id.
    let mut seen = HashSet::new();
    for (name, chain) in enabled {
        if chain.chain_rid.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "chains.{name}.chain-rid is required"
            )));
        }
        if !seen.insert(chain.chain_rid.clone()) {
            return Err(Error::InvalidConfig(format!(
                "chain-rid {} is configured more than once",
                chain.chain_rid
            )));
        }
        if chain.private_key.is_none() {
            return Err(Error::MissingSecrets(format!(
                "chains.{name}.private-key"
            )));
        }
        config.chains.insert(chain.chain_rid.clone(), chain);
    }
    if config.chains.is_empty() {
        return Err(Error::InvalidConfig("no enabled chain configured".into()));
    }

    check_tls_material(&config)?;

    tracing::trace!(
        "postloaded config: {}",
        serde_json::to_string_pretty(&config)?
    );

    Ok(config)
}

fn check_tls_material(config: &GatewayConfig) -> tcc_gateway_utils::Result<()> {
    let relay = &config.relay;
    match (&relay.client_cert, &relay.client_key) {
        (Some(_), None) => {
            return Err(Error::MissingSecrets("relay.client-key".into()))
        }
        (None, Some(_)) => {
            return Err(Error::MissingSecrets("relay.client-cert".into()))
        }
        _ => {}
    }
    let files = [&relay.tls_ca, &relay.client_cert, &relay.client_key];
    for path in files.into_iter().flatten() {
        if !path.is_file() {
            return Err(Error::MissingSecrets(format!(
                "TLS file {} does not exist",
                path.display()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const KEY: &str =
        "0x8917174396171783496173419137618235192359106130478137647163400318";

    fn write(dir: &Path, name: &str, body: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    fn base_toml() -> String {
        format!(
            r#"
[base]
gateway-id = "gw-1"
tx-verify-type = "spv"

[relay]
address = "http://127.0.0.1:19999"
access-code = "secret"

[block-header-sync]
batch-count = 30

[chains.local]
chain-rid = "chain1"
enabled = true
chain-id = 1337
http-endpoint = "http://127.0.0.1:8545"
cross-contract-name = "0x0000000000000000000000000000000000000001"
private-key = "{KEY}"

[chains.old]
chain-rid = "chain2"
chain-id = 5
http-endpoint = "http://127.0.0.1:8546"
cross-contract-name = "0x0000000000000000000000000000000000000002"
"#
        )
    }

    #[test]
    fn loads_and_keys_enabled_chains_by_rid() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "gateway.toml", &base_toml());
        let config = load(tmp.path()).unwrap();
        assert_eq!(config.base.gateway_id, "gw-1");
        assert_eq!(
            config.base.tx_verify_type,
            tcc_gateway_types::TxVerifyType::Spv
        );
        assert_eq!(config.block_header_sync.batch_count, 30);
        assert_eq!(config.relay.retry_interval, 5_000);
        assert_eq!(config.rpc.port, 19996);
        assert_eq!(config.chains.len(), 1);
        let chain = &config.chains["chain1"];
        assert_eq!(chain.chain_id, 1337);
        assert_eq!(chain.max_blocks_per_step, 500);
    }

    #[test]
    fn files_in_subdirectories_are_merged() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "gateway.toml", &base_toml());
        std::fs::create_dir(tmp.path().join("rpc")).unwrap();
        write(
            &tmp.path().join("rpc"),
            "rpc.json",
            r#"{ "rpc": { "port": 20000, "blacklist": ["10.0.0.1"] } }"#,
        );
        let config = load(tmp.path()).unwrap();
        assert_eq!(config.rpc.port, 20000);
        assert_eq!(config.rpc.blacklist.len(), 1);
    }

    #[test]
    fn missing_gateway_id_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let body = base_toml().replace("gateway-id = \"gw-1\"", "gateway-id = \"\"");
        write(tmp.path(), "gateway.toml", &body);
        assert!(matches!(load(tmp.path()), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn zero_header_sync_interval_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let body = base_toml()
            .replace("batch-count = 30", "batch-count = 30\ninterval = 0");
        write(tmp.path(), "gateway.toml", &body);
        match load(tmp.path()) {
            Err(Error::InvalidConfig(msg)) => {
                assert!(msg.contains("block-header-sync.interval"))
            }
            other => panic!("expected an invalid config, got {other:?}"),
        }
    }

    #[test]
    fn enabled_chain_without_key_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let body = base_toml().replace(&format!("private-key = \"{KEY}\""), "");
        write(tmp.path(), "gateway.toml", &body);
        assert!(matches!(load(tmp.path()), Err(Error::MissingSecrets(_))));
    }

    #[test]
    fn missing_tls_files_are_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let body = base_toml().replace(
            "access-code = \"secret\"",
            "access-code = \"secret\"\ntls-ca = \"/does/not/exist.pem\"",
        );
        write(tmp.path(), "gateway.toml", &body);
        assert!(matches!(load(tmp.path()), Err(Error::MissingSecrets(_))));
    }
}
