// src/core/handler/actions/qos.rs

use crate::config::{QosCatalogEntry, QosUsersFile};
use crate::connection::SessionState;
use crate::core::commands::generic::qos::{Qos, QosSubcommand};
use crate::core::handler::command_router::RouteResponse;
use crate::core::qos::hooks as qos_hooks;
use crate::core::qos::limits::{apply_value, is_valid_name, parse_memory};
use crate::core::state::ServerState;
use crate::core::{RespValue, SpinelDBError};
use std::sync::Arc;
use tracing::info;

pub async fn handle_qos(
    cmd: Qos,
    session: &mut SessionState,
    state: &Arc<ServerState>,
    _session_id: u64,
) -> Result<RouteResponse, SpinelDBError> {
    let value = match cmd.subcommand {
        QosSubcommand::SetWorkMem(value) => handle_set_work_mem(state, session, &value).await?,
        QosSubcommand::AlterRole { role, name, value } => handle_alter(state, Some(role), None, &name, &value).await?,
        QosSubcommand::AlterDatabase { database, name, value } => {
            handle_alter(state, None, Some(database), &name, &value).await?
        }
        QosSubcommand::Reset => {
            session.qos_cache.reset_session_override();
            RespValue::SimpleString("OK".into())
        }
        QosSubcommand::Version => RespValue::BulkString(format!("qos-{}", env!("CARGO_PKG_VERSION")).into()),
        QosSubcommand::Stats { reset } => handle_stats(state, reset),
        QosSubcommand::Settings => handle_settings(state).await,
        QosSubcommand::Save => handle_save(state).await?,
    };
    Ok(RouteResponse::Single(value))
}

async fn handle_set_work_mem(
    state: &Arc<ServerState>,
    session: &mut SessionState,
    value: &str,
) -> Result<RespValue, SpinelDBError> {
    let kb = parse_memory(value).map_err(|e| SpinelDBError::QosInvalidValue(e.to_string()))?;
    let bytes = if kb == -1 { None } else { Some(kb as u64) };
    if let Some(requested) = bytes {
        qos_hooks::check_work_mem_override(state, session, requested).await?;
    }
    session.qos_cache.set_work_mem_override(bytes);
    Ok(RespValue::SimpleString("OK".into()))
}

async fn handle_alter(
    state: &Arc<ServerState>,
    role: Option<String>,
    database: Option<usize>,
    name: &str,
    value: &str,
) -> Result<RespValue, SpinelDBError> {
    if !is_valid_name(name) {
        return Err(SpinelDBError::QosInvalidName(name.to_string()));
    }
    // Validate eagerly so a bad value never reaches the persisted catalog.
    let mut scratch = Default::default();
    apply_value(&mut scratch, name, value, true).map_err(|e| SpinelDBError::QosInvalidValue(e.to_string()))?;

    let mut config_qos_guard = state.qos_config.write().await;
    let config = Arc::make_mut(&mut config_qos_guard);

    let entry = match config.entries.iter_mut().find(|e| e.role == role && e.database == database) {
        Some(e) => e,
        None => {
            config.entries.push(QosCatalogEntry {
                role: role.clone(),
                database,
                settings: Vec::new(),
            });
            config.entries.last_mut().unwrap()
        }
    };
    let prefix = format!("{name}=");
    entry.settings.retain(|s| !s.starts_with(&prefix));
    entry.settings.push(format!("{name}={value}"));

    drop(config_qos_guard);
    state.qos_shared.bump_epoch();

    Ok(RespValue::SimpleString("OK".into()))
}

fn handle_stats(state: &Arc<ServerState>, reset: bool) -> RespValue {
    if reset {
        state.qos_shared.reset_stats();
        return RespValue::SimpleString("OK".into());
    }
    let stats = state.qos_shared.stats_snapshot();
    RespValue::Array(vec![
        RespValue::BulkString("admitted_total".into()),
        RespValue::Integer(stats.admitted_total as i64),
        RespValue::BulkString("throttled_total".into()),
        RespValue::Integer(stats.throttled_total as i64),
        RespValue::BulkString("rejected_total".into()),
        RespValue::Integer(stats.rejected_total as i64),
        RespValue::BulkString("work_mem_violations".into()),
        RespValue::Integer(stats.work_mem_violations as i64),
        RespValue::BulkString("cpu_violations".into()),
        RespValue::Integer(stats.cpu_violations as i64),
        RespValue::BulkString("tx_violations".into()),
        RespValue::Integer(stats.tx_violations as i64),
        RespValue::BulkString("select_violations".into()),
        RespValue::Integer(stats.select_violations as i64),
        RespValue::BulkString("update_violations".into()),
        RespValue::Integer(stats.update_violations as i64),
        RespValue::BulkString("delete_violations".into()),
        RespValue::Integer(stats.delete_violations as i64),
        RespValue::BulkString("insert_violations".into()),
        RespValue::Integer(stats.insert_violations as i64),
    ])
}

async fn handle_settings(state: &Arc<ServerState>) -> RespValue {
    let config_qos_guard = state.qos_config.read().await;
    let mut response = vec![
        RespValue::BulkString("enabled".into()),
        RespValue::BulkString(config_qos_guard.enabled.to_string().into()),
        RespValue::BulkString("max_affinity_entries".into()),
        RespValue::Integer(config_qos_guard.max_affinity_entries as i64),
        RespValue::BulkString("max_cores_per_entry".into()),
        RespValue::Integer(config_qos_guard.max_cores_per_entry as i64),
    ];
    for entry in &config_qos_guard.entries {
        let scope = match (&entry.role, entry.database) {
            (Some(role), Some(db)) => format!("role={role} database={db}"),
            (Some(role), None) => format!("role={role}"),
            (None, Some(db)) => format!("database={db}"),
            (None, None) => "global".to_string(),
        };
        response.push(RespValue::BulkString(scope.into()));
        response.push(RespValue::BulkString(entry.settings.join(",").into()));
    }
    RespValue::Array(response)
}

async fn handle_save(state: &Arc<ServerState>) -> Result<RespValue, SpinelDBError> {
    let server_config = state.config.lock().await;
    let Some(qos_file_path) = server_config.qos_file.as_ref() else {
        return Err(SpinelDBError::InvalidState(
            "ERR QoS file not configured. Set 'qos_file' in config.toml to use QOS SAVE.".to_string(),
        ));
    };
    let qos_file_path_clone = qos_file_path.clone();
    drop(server_config);

    let config_qos_guard = state.qos_config.read().await;
    let entries_to_save = QosUsersFile {
        entries: config_qos_guard.entries.clone(),
    };
    drop(config_qos_guard);

    let save_result = tokio::task::spawn_blocking(move || -> Result<(), SpinelDBError> {
        let json_string = serde_json::to_string_pretty(&entries_to_save)
            .map_err(|e| SpinelDBError::Internal(format!("Failed to serialize QoS catalog to JSON: {e}")))?;

        let temp_path_str = format!("{}.tmp-qos-save-{}", qos_file_path_clone, rand::random::<u32>());
        let temp_path = std::path::Path::new(&temp_path_str);

        std::fs::write(temp_path, json_string)
            .map_err(|e| SpinelDBError::Internal(format!("Failed to write temp QoS file: {e}")))?;

        std::fs::rename(temp_path, &qos_file_path_clone)
            .map_err(|e| SpinelDBError::Internal(format!("Failed to atomically rename QoS file: {e}")))?;

        info!("QoS catalog saved successfully to '{}'", qos_file_path_clone);
        Ok(())
    })
    .await;

    match save_result {
        Ok(Ok(_)) => Ok(RespValue::SimpleString("OK".into())),
        Ok(Err(e)) => Err(e),
        Err(join_err) => Err(SpinelDBError::Internal(format!("QOS SAVE task panicked: {join_err}"))),
    }
}
