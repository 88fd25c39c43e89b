use chrono::{DateTime, Utc};
use pool_statsd::memory::{MemoryConnection, MemoryDatabase, MemoryError};
use pool_statsd::{
    CallableStatement, Connection, InstrumentedConnection, PoolHook, PreparedStatement, Statement,
    StatsdInterceptor, Value,
};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

type PooledConnection = InstrumentedConnection<MemoryConnection>;

// ─── Plan ────────────────────────────────────────────────────────

/// Shape of one load run. Every worker borrows its own intercepted
/// connection for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadPlan {
    #[serde(default = "default_workers")]
    pub workers: u32,
    #[serde(default = "default_duration")]
    pub duration_secs: u64,
    /// Share of units of work that only read (0 to 100)
    #[serde(default = "default_read_pct")]
    pub read_pct: u8,
}

fn default_workers() -> u32 {
    8
}
fn default_duration() -> u64 {
    30
}
fn default_read_pct() -> u8 {
    70
}

impl Default for LoadPlan {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            duration_secs: default_duration(),
            read_pct: default_read_pct(),
        }
    }
}

impl LoadPlan {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=256).contains(&self.workers) {
            return Err(format!("workers must be 1..=256, got {}", self.workers));
        }
        if !(1..=300).contains(&self.duration_secs) {
            return Err(format!("duration_secs must be 1..=300, got {}", self.duration_secs));
        }
        if self.read_pct > 100 {
            return Err(format!("read_pct must be 0..=100, got {}", self.read_pct));
        }
        Ok(())
    }
}

// ─── Run handle ──────────────────────────────────────────────────

/// A started run; dropping it does not stop the workers, `stop` does.
pub struct LoadRun {
    pub plan: LoadPlan,
    pub started_at: DateTime<Utc>,
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl LoadRun {
    pub fn start(plan: LoadPlan, hook: Arc<StatsdInterceptor>, db: MemoryDatabase) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        tracing::info!(
            workers = plan.workers,
            duration_secs = plan.duration_secs,
            read_pct = plan.read_pct,
            "Starting load run"
        );
        let handle = tokio::spawn(run(running.clone(), hook, db, plan.clone()));
        Self {
            plan,
            started_at: Utc::now(),
            running,
            handle,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Ask the workers to stop and wait until they have.
    pub async fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Load run ended abnormally");
        }
    }
}

// ─── Driver ──────────────────────────────────────────────────────

async fn run(
    running: Arc<AtomicBool>,
    hook: Arc<StatsdInterceptor>,
    db: MemoryDatabase,
    plan: LoadPlan,
) {
    let deadline = Instant::now() + Duration::from_secs(plan.duration_secs);
    prepare_schema(&db);

    let mut handles = Vec::with_capacity(plan.workers as usize);
    for worker_id in 0..plan.workers {
        let running = running.clone();
        let hook = hook.clone();
        let db = db.clone();
        let read_pct = plan.read_pct;

        // The resource API is synchronous; keep it off the async workers
        handles.push(tokio::task::spawn_blocking(move || {
            worker(worker_id, running, hook, db, deadline, read_pct);
        }));
    }

    for h in handles {
        if let Err(e) = h.await {
            tracing::warn!(error = %e, "Load worker panicked");
        }
    }

    running.store(false, Ordering::SeqCst);
    tracing::info!("Load run finished");
}

fn prepare_schema(db: &MemoryDatabase) {
    let mut conn = db.connect();
    let created = conn
        .create_statement()
        .and_then(|mut s| s.execute("CREATE TABLE orders (id INTEGER, item TEXT, qty INTEGER)"));
    if let Err(e) = created {
        tracing::warn!(error = %e, "Could not create demo schema");
    }
}

// ─── Worker loop ─────────────────────────────────────────────────

fn worker(
    id: u32,
    running: Arc<AtomicBool>,
    hook: Arc<StatsdInterceptor>,
    db: MemoryDatabase,
    deadline: Instant,
    read_pct: u8,
) {
    // Each worker gets its own deterministic RNG seeded uniquely.
    let mut rng = StdRng::seed_from_u64(1000 + id as u64);

    let mut conn = match hook.intercept(db.connect()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(worker = id, error = %e, "Cannot intercept connection");
            return;
        }
    };

    while running.load(Ordering::Relaxed) && Instant::now() < deadline {
        let is_read = rng.gen_range(0u8..100) < read_pct;

        let result = if is_read {
            do_read(&mut rng, &mut conn)
        } else {
            do_write(&mut rng, &mut conn)
        };

        if let Err(e) = result {
            tracing::debug!(worker = id, error = %e, "Demo operation failed");
        }
    }

    PoolHook::<MemoryConnection>::reset(&*hook, &mut conn);
    if let Err(e) = conn.close() {
        tracing::debug!(worker = id, error = %e, "Close failed");
    }
}

// ─── Read operations ─────────────────────────────────────────────

fn do_read(rng: &mut StdRng, conn: &mut PooledConnection) -> Result<(), MemoryError> {
    // 80 % plain queries, 20 % stored-procedure calls
    if rng.gen_bool(0.8) {
        let mut stmt = conn.create_statement()?;
        let rows = stmt.execute_query("SELECT * FROM orders LIMIT 50")?;
        tracing::trace!(rows = rows.len(), "Read orders");
        stmt.close()
    } else {
        let mut call = conn.prepare_call("CALL count_orders(?)")?;
        call.register_out_parameter(1)?;
        call.execute_prepared()?;
        let total = call.out_value(1)?;
        tracing::trace!(?total, "Counted orders");
        call.close()
    }
}

// ─── Write operations ────────────────────────────────────────────

fn do_write(rng: &mut StdRng, conn: &mut PooledConnection) -> Result<(), MemoryError> {
    static ITEMS: &[&str] = &["keyboard", "monitor", "cable", "dock", "mouse"];

    conn.set_auto_commit(false)?;

    let mut insert = conn.prepare_statement("INSERT INTO orders VALUES (?, ?, ?)")?;
    let rows = rng.gen_range(1..=4);
    for _ in 0..rows {
        insert.bind(1, Value::Int(rng.gen_range(1..=1_000_000)))?;
        insert.bind(2, Value::Text(ITEMS[rng.gen_range(0..ITEMS.len())].into()))?;
        insert.bind(3, Value::Int(rng.gen_range(1..=10)))?;
        insert.add_batch_prepared()?;
    }
    insert.execute_batch()?;
    insert.close()?;

    // A small share of transactions fail and roll back, so error timings show up too
    let outcome = if rng.gen_bool(0.05) {
        conn.create_statement()
            .and_then(|mut s| s.execute_update("FAIL constraint violation"))
    } else {
        Ok(0)
    };

    match outcome {
        Ok(_) => conn.commit()?,
        Err(e) => {
            conn.rollback()?;
            return Err(e);
        }
    }

    conn.set_auto_commit(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_defaults_apply_to_missing_fields() {
        let plan: LoadPlan = serde_json::from_str(r#"{"workers": 2}"#).unwrap();
        assert_eq!(plan.workers, 2);
        assert_eq!(plan.duration_secs, 30);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn plan_bounds_are_enforced() {
        let plan = LoadPlan {
            read_pct: 101,
            ..LoadPlan::default()
        };
        assert!(plan.validate().unwrap_err().contains("read_pct"));

        let plan = LoadPlan {
            workers: 0,
            ..LoadPlan::default()
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn read_and_write_units_report_through_the_hook() {
        let db = MemoryDatabase::new();
        prepare_schema(&db);

        let mut hook = StatsdInterceptor::new();
        let props: std::collections::HashMap<String, String> = [
            ("hostname", "127.0.0.1"),
            ("port", "9"),
            ("sampleRate", "1.0"),
            ("prefix", "demo."),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        PoolHook::<MemoryConnection>::configure(&mut hook, &props).unwrap();

        let mut conn = hook.intercept(db.connect()).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..20 {
            // the FAIL branch surfaces as an error after its rollback
            let _ = do_write(&mut rng, &mut conn);
            do_read(&mut rng, &mut conn).unwrap();
        }
        assert!(db.row_count("orders") > 0);
    }
}
