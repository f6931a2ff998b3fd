//! Shared helpers for brt-ingest integration tests
//!
//! - [`TestPostgres`]: throwaway PostgreSQL container (needs Docker)
//! - [`RecordingWarehouse`]: in-memory warehouse that records every call
//! - feed fixtures and a wiremock helper standing in for the upstream feed

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use brt_common::VehicleRecord;
use brt_ingest::config::{DatabaseConfig, FeedConfig};
use brt_ingest::{Fetcher, IngestError, IngestResult, StorageError, StoredRow, Warehouse};
use chrono::Utc;
use serde_json::{json, Value};
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const FEED_PATH: &str = "/gps/brt";

pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,brt_ingest=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Feed fixtures
// ============================================================================

/// Two vehicles with identical field sets, as the live feed usually sends
pub fn feed_body() -> Value {
    json!({
        "vehicles": [
            {
                "codigo": "BRT-1001",
                "placa": "LSN4I49",
                "linha": "42A",
                "latitude": -22.98765,
                "longitude": -43.36543,
                "dataHora": 1714571107000_i64,
                "velocidade": 37,
                "id_migracao_trajeto": null,
                "sentido": "Alvorada → Galeão",
                "trajeto": "42A - Alvorada x Galeão (Expresso)",
                "hodometro": 120345.6,
                "direcao": "",
                "ignicao": 1,
                "capacidadePeVeiculo": 125,
                "capacidadeSentadoVeiculo": 40
            },
            {
                "codigo": "BRT-2002",
                "placa": "KYZ1B22",
                "linha": "11",
                "latitude": -22.91234,
                "longitude": -43.23456,
                "dataHora": 1714571109000_i64,
                "velocidade": 0,
                "id_migracao_trajeto": 77,
                "sentido": "Terminal Recreio",
                "trajeto": "11 - Recreio x Jardim Oceânico",
                "hodometro": 98012.0,
                "direcao": "N",
                "ignicao": 0,
                "capacidadePeVeiculo": 110,
                "capacidadeSentadoVeiculo": 36
            }
        ]
    })
}

pub fn feed_vehicles() -> Vec<VehicleRecord> {
    feed_body()["vehicles"]
        .as_array()
        .expect("fixture has vehicles")
        .iter()
        .map(|v| v.as_object().expect("vehicle is an object").clone())
        .collect()
}

/// Mock feed answering every GET with `response`, expected `calls` times
pub async fn mock_feed(response: ResponseTemplate, calls: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(response)
        .expect(calls)
        .mount(&server)
        .await;
    server
}

pub fn fetcher_for(server: &MockServer) -> Fetcher {
    Fetcher::new(&FeedConfig {
        url: format!("{}{}", server.uri(), FEED_PATH),
    })
    .expect("Failed to build HTTP client")
}

// ============================================================================
// In-memory warehouse
// ============================================================================

/// Warehouse fake that records calls and inserted payloads
#[derive(Debug, Default)]
pub struct RecordingWarehouse {
    fail_provisioning: bool,
    calls: Mutex<Vec<&'static str>>,
    inserted: Mutex<Vec<Vec<VehicleRecord>>>,
}

impl RecordingWarehouse {
    pub fn failing_provisioning() -> Self {
        Self {
            fail_provisioning: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn inserted(&self) -> Vec<Vec<VehicleRecord>> {
        self.inserted.lock().expect("inserted lock").clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl Warehouse for RecordingWarehouse {
    async fn ensure_schema(&self) -> IngestResult<()> {
        self.record("ensure_schema");
        if self.fail_provisioning {
            return Err(IngestError::Provisioning {
                object: "schema raw_brt".into(),
                source: StorageError(sqlx::Error::PoolTimedOut),
            });
        }
        Ok(())
    }

    async fn ensure_table(&self) -> IngestResult<()> {
        self.record("ensure_table");
        Ok(())
    }

    async fn insert_rows(&self, records: &[VehicleRecord]) -> IngestResult<StoredRow> {
        self.record("insert_rows");
        let mut inserted = self.inserted.lock().expect("inserted lock");
        inserted.push(records.to_vec());

        Ok(StoredRow {
            id: inserted.len() as i32,
            extracted_at: Utc::now(),
            payload: Value::Array(records.iter().cloned().map(Value::Object).collect()),
        })
    }
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    config: DatabaseConfig,
}

impl TestPostgres {
    pub async fn start() -> anyhow::Result<Self> {
        let container = Postgres::default().with_tag("16-alpine").start().await?;
        let host = container.get_host().await?.to_string();
        let port = container.get_host_port_ipv4(5432.tcp()).await?;

        let config = DatabaseConfig {
            user: "postgres".into(),
            password: "postgres".into(),
            host,
            port,
            name: "postgres".into(),
            schema: "raw_brt".into(),
            table: "gps_brt".into(),
            max_connections: 2,
            acquire_timeout_secs: 10,
        };

        Ok(Self {
            _container: container,
            config,
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }
}
