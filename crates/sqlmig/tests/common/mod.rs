//! Scripted in-memory backend used to inject failures the real drivers can't
//! produce on demand.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use sqlmig::ledger::{COUNT_SQL, CREATE_TABLE_SQL, INSERT_SQL};
use sqlmig::{BackendError, BackendResult, DatabasePool, DatabaseTransaction};

/// Failures to inject
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Bodies containing this text fail to execute
    pub fail_body_containing: Option<String>,
    /// Commit fails for the transaction that recorded this name
    pub fail_commit_of: Option<String>,
    /// Ledger counts always read zero, as if another runner had not committed yet
    pub stale_check: bool,
    /// Ledger count for this name reads two
    pub duplicate_count_for: Option<String>,
    /// Bodies containing this text never finish
    pub hang_on_body_containing: Option<String>,
}

/// What the fake database has made durable, plus everything it was asked to do
#[derive(Debug, Default)]
pub struct State {
    pub schema: bool,
    pub ledger: BTreeSet<String>,
    pub executed: Vec<String>,
    pub statements: Vec<String>,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FakeDatabase {
    state: Arc<Mutex<State>>,
    faults: Faults,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Faults) -> Self {
        Self {
            faults,
            ..Self::default()
        }
    }

    /// Same durable state, different faults
    pub fn reconfigure(&self, faults: Faults) -> Self {
        Self {
            state: Arc::clone(&self.state),
            faults,
        }
    }

    /// Pretend these names were applied by an earlier run
    pub fn seed_applied(&self, names: &[&str]) {
        let mut state = self.state();
        state.schema = true;
        state.ledger.extend(names.iter().map(|name| name.to_string()));
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn ledger(&self) -> Vec<String> {
        self.state().ledger.iter().cloned().collect()
    }

    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    /// Names whose ledger count was queried, in order
    pub fn checked(&self) -> Vec<String> {
        self.state()
            .statements
            .iter()
            .filter_map(|stmt| stmt.strip_prefix(&format!("{} <- ", COUNT_SQL)))
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl DatabasePool for FakeDatabase {
    async fn begin_transaction(&self) -> BackendResult<Box<dyn DatabaseTransaction>> {
        self.state().begins += 1;
        Ok(Box::new(FakeTransaction {
            state: Arc::clone(&self.state),
            faults: self.faults.clone(),
            schema: false,
            records: Vec::new(),
            bodies: Vec::new(),
        }))
    }

    fn backend_name(&self) -> &'static str {
        "fake"
    }
}

pub struct FakeTransaction {
    state: Arc<Mutex<State>>,
    faults: Faults,
    schema: bool,
    records: Vec<String>,
    bodies: Vec<String>,
}

impl FakeTransaction {
    fn log(&self, sql: &str, params: &[&str]) {
        let entry = if params.is_empty() {
            sql.to_string()
        } else {
            format!("{} <- {}", sql, params.join(", "))
        };
        self.state.lock().unwrap().statements.push(entry);
    }

    fn schema_visible(&self) -> bool {
        self.schema || self.state.lock().unwrap().schema
    }
}

#[async_trait]
impl DatabaseTransaction for FakeTransaction {
    async fn execute(&mut self, sql: &str, params: &[&str]) -> BackendResult<u64> {
        self.log(sql, params);

        if sql == CREATE_TABLE_SQL {
            self.schema = true;
            return Ok(0);
        }

        if sql == INSERT_SQL {
            if !self.schema_visible() {
                return Err(BackendError::Driver(
                    "relation \"db_migrations\" does not exist".to_string(),
                ));
            }
            let name = params[0].to_string();
            let taken = self.records.contains(&name) || self.state.lock().unwrap().ledger.contains(&name);
            if taken {
                return Err(BackendError::UniqueViolation(format!(
                    "duplicate key value violates unique constraint \"db_migrations_pkey\" ({})",
                    name
                )));
            }
            self.records.push(name);
            return Ok(1);
        }

        Err(BackendError::Driver(format!("unexpected statement: {}", sql)))
    }

    async fn execute_script(&mut self, sql: &str) -> BackendResult<()> {
        self.log(sql, &[]);

        if let Some(needle) = &self.faults.hang_on_body_containing {
            if sql.contains(needle.as_str()) {
                std::future::pending::<()>().await;
            }
        }
        if let Some(needle) = &self.faults.fail_body_containing {
            if sql.contains(needle.as_str()) {
                return Err(BackendError::Driver(format!("syntax error near {:?}", needle)));
            }
        }

        self.bodies.push(sql.to_string());
        Ok(())
    }

    async fn fetch_count(&mut self, sql: &str, params: &[&str]) -> BackendResult<i64> {
        self.log(sql, params);

        if sql != COUNT_SQL {
            return Err(BackendError::Driver(format!("unexpected query: {}", sql)));
        }
        if !self.schema_visible() {
            return Err(BackendError::Driver(
                "relation \"db_migrations\" does not exist".to_string(),
            ));
        }

        let name = params[0];
        if self.faults.duplicate_count_for.as_deref() == Some(name) {
            return Ok(2);
        }
        if self.faults.stale_check {
            return Ok(0);
        }

        let durable = self.state.lock().unwrap().ledger.contains(name);
        let pending = self.records.iter().any(|record| record == name);
        Ok(i64::from(durable || pending))
    }

    async fn commit(self: Box<Self>) -> BackendResult<()> {
        if let Some(name) = &self.faults.fail_commit_of {
            if self.records.contains(name) {
                self.state.lock().unwrap().rollbacks += 1;
                return Err(BackendError::Driver("could not serialize access".to_string()));
            }
        }

        let mut state = self.state.lock().unwrap();
        state.commits += 1;
        state.schema |= self.schema;
        state.ledger.extend(self.records.iter().cloned());
        state.executed.extend(self.bodies.iter().cloned());
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> BackendResult<()> {
        self.state.lock().unwrap().rollbacks += 1;
        Ok(())
    }
}
