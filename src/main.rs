use clap::Parser;
use malipo::application::auth::AuthGate;
use malipo::application::registry::{AuthSession, MerchantRegistry};
use malipo::application::service::OrderService;
use malipo::application::settlement::{SettlementConfig, SettlementEngine};
use malipo::domain::merchant::{MerchantIdentity, PaymentMethodKind};
use malipo::domain::order::{LineItem, OrderDraft, OrderId};
use malipo::domain::ports::{
    MerchantStoreArc, OrderStoreArc, OutcomeResolverArc, PasswordHasherArc,
};
use malipo::error::{PaymentError, Result as AppResult};
use malipo::infrastructure::gateway::RandomOutcome;
use malipo::infrastructure::hasher::SaltedSha256Hasher;
use malipo::infrastructure::in_memory::{InMemoryMerchantStore, InMemoryOrderStore};
use malipo::interfaces::csv::order_writer::{OrderReportRow, OrderReportWriter};
use malipo::interfaces::csv::scenario_reader::{ScenarioReader, ScenarioRowType};
use miette::{IntoDiagnostic, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Password of the scenario merchant. Fixed so a persistent database can be
/// reopened by a later run.
const DEMO_PASSWORD: &str = "demo-password";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input scenario CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Delay in milliseconds between order creation and automatic settlement
    #[arg(long, default_value_t = 5000)]
    settle_delay_ms: u64,

    /// Probability that an automatic settlement resolves to paid
    #[arg(long, default_value_t = RandomOutcome::DEFAULT_PAID_RATIO)]
    paid_ratio: f64,

    /// Seed for the outcome draw, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Exit after the replay instead of waiting for pending orders to settle
    #[arg(long)]
    no_wait: bool,

    /// Display name of the scenario merchant
    #[arg(long, default_value = "Demo Merchant")]
    merchant_name: String,

    /// Login email of the scenario merchant
    #[arg(long, default_value = "demo@malipo.test")]
    merchant_email: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let (orders, merchants) = if let Some(db_path) = cli.db_path.clone() {
        persistent_stores(db_path)?
    } else {
        in_memory_stores()
    };

    let resolver: OutcomeResolverArc = match cli.seed {
        Some(seed) => Arc::new(RandomOutcome::with_seed(cli.paid_ratio, seed)),
        None => Arc::new(RandomOutcome::new(cli.paid_ratio)),
    };
    let hasher: PasswordHasherArc = Arc::new(SaltedSha256Hasher::default());

    let secret =
        std::env::var("MALIPO_TOKEN_SECRET").unwrap_or_else(|_| "malipo-dev-secret".into());
    let gate = Arc::new(AuthGate::new(secret.into_bytes(), Arc::clone(&merchants)));
    let registry = MerchantRegistry::new(Arc::clone(&merchants), hasher, Arc::clone(&gate));

    let config = SettlementConfig {
        settle_delay: Duration::from_millis(cli.settle_delay_ms),
        ..SettlementConfig::default()
    };
    let engine = Arc::new(SettlementEngine::new(Arc::clone(&orders), resolver, config));
    let service = OrderService::new(orders, Arc::clone(&engine));

    let session = demo_session(&registry, &cli).await.into_diagnostic()?;
    let identity = gate.authenticate(&session.token).await.into_diagnostic()?;

    // Orders a previous run left pending settle on their persisted deadline.
    engine.recover_pending().await.into_diagnostic()?;

    let file = File::open(&cli.input).into_diagnostic()?;
    let placed = replay_scenario(&service, identity, ScenarioReader::new(file)).await;

    if !cli.no_wait {
        let cap = Duration::from_millis(cli.settle_delay_ms) + Duration::from_secs(5);
        wait_for_settlement(&service, identity, cap)
            .await
            .into_diagnostic()?;
    }

    let mut owned = service.list_orders(identity).await.into_diagnostic()?;
    owned.reverse(); // report in creation order
    let key_by_id: HashMap<OrderId, String> =
        placed.into_iter().map(|(key, id)| (id, key)).collect();
    let rows = owned
        .into_iter()
        .map(|order| OrderReportRow {
            order: key_by_id
                .get(&order.id)
                .cloned()
                .unwrap_or_else(|| order.id.to_string()),
            customer: order.customer_name,
            phone: order.customer_phone,
            method: order.payment_method,
            total: order.total,
            status: order.status,
        })
        .collect();

    let stdout = io::stdout();
    let mut writer = OrderReportWriter::new(stdout.lock());
    writer.write_orders(rows).into_diagnostic()?;

    Ok(())
}

fn in_memory_stores() -> (OrderStoreArc, MerchantStoreArc) {
    (
        Arc::new(InMemoryOrderStore::new()),
        Arc::new(InMemoryMerchantStore::new()),
    )
}

#[cfg(feature = "storage-rocksdb")]
fn persistent_stores(path: PathBuf) -> Result<(OrderStoreArc, MerchantStoreArc)> {
    let store = malipo::infrastructure::rocksdb::RocksDbStore::open(path).into_diagnostic()?;
    Ok((Arc::new(store.clone()), Arc::new(store)))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn persistent_stores(_path: PathBuf) -> Result<(OrderStoreArc, MerchantStoreArc)> {
    eprintln!(
        "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
    );
    Ok(in_memory_stores())
}

/// Logs the scenario merchant in, registering it on first contact.
async fn demo_session(registry: &MerchantRegistry, cli: &Cli) -> AppResult<AuthSession> {
    match registry.login(&cli.merchant_email, DEMO_PASSWORD).await {
        Ok(session) => Ok(session),
        Err(PaymentError::InvalidCredential(_)) => {
            registry
                .register(&cli.merchant_name, &cli.merchant_email, DEMO_PASSWORD)
                .await
        }
        Err(e) => Err(e),
    }
}

struct DraftParts {
    customer: String,
    phone: String,
    method: PaymentMethodKind,
    items: Vec<LineItem>,
}

/// Replays scenario rows against the service.
///
/// Item rows accumulate into per-key drafts; a draft is placed as an order
/// when the scenario first confirms it, or after the last row for drafts the
/// scenario never confirms. Bad rows are reported and skipped, like any
/// other row-level failure.
async fn replay_scenario<R: Read>(
    service: &OrderService,
    identity: MerchantIdentity,
    reader: ScenarioReader<R>,
) -> HashMap<String, OrderId> {
    let mut order_keys: Vec<String> = Vec::new();
    let mut drafts: HashMap<String, DraftParts> = HashMap::new();
    let mut placed: HashMap<String, OrderId> = HashMap::new();

    for row in reader.rows() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                eprintln!("Error reading scenario row: {e}");
                continue;
            }
        };
        match row.r#type {
            ScenarioRowType::Item => {
                if placed.contains_key(&row.order) {
                    eprintln!("Error in scenario: order {} is already placed", row.order);
                    continue;
                }
                let (Some(name), Some(quantity), Some(price)) =
                    (row.item, row.quantity, row.price)
                else {
                    eprintln!(
                        "Error in scenario: item row for {} is missing item, quantity or price",
                        row.order
                    );
                    continue;
                };
                let draft = drafts.entry(row.order.clone()).or_insert_with(|| {
                    order_keys.push(row.order.clone());
                    DraftParts {
                        customer: row.customer.unwrap_or_else(|| "Walk-in Customer".into()),
                        phone: row.phone.unwrap_or_default(),
                        method: row.method.unwrap_or(PaymentMethodKind::Mobile),
                        items: Vec::new(),
                    }
                });
                draft.items.push(LineItem {
                    name,
                    quantity,
                    price,
                });
            }
            ScenarioRowType::Confirm => {
                if let Some(parts) = drafts.remove(&row.order) {
                    place_order(service, identity, &row.order, parts, &mut placed).await;
                }
                match placed.get(&row.order) {
                    Some(&order_id) => {
                        if let Err(e) = service.confirm_payment(identity, order_id).await {
                            eprintln!("Error confirming order {}: {e}", row.order);
                        }
                    }
                    None => {
                        eprintln!("Error in scenario: confirm for unknown order {}", row.order);
                    }
                }
            }
        }
    }

    // Unconfirmed drafts become orders now; their deferred timers settle them.
    for key in order_keys {
        if let Some(parts) = drafts.remove(&key) {
            place_order(service, identity, &key, parts, &mut placed).await;
        }
    }

    placed
}

async fn place_order(
    service: &OrderService,
    identity: MerchantIdentity,
    key: &str,
    parts: DraftParts,
    placed: &mut HashMap<String, OrderId>,
) {
    let draft = OrderDraft {
        customer_name: parts.customer,
        customer_phone: parts.phone,
        items: parts.items,
        payment_method: parts.method,
        total: None,
    };
    match service.create_order(identity, draft).await {
        Ok(order) => {
            placed.insert(key.to_string(), order.id);
        }
        Err(e) => eprintln!("Error placing order {key}: {e}"),
    }
}

/// Polls until every owned order is terminal, or until `cap` elapses.
async fn wait_for_settlement(
    service: &OrderService,
    identity: MerchantIdentity,
    cap: Duration,
) -> AppResult<()> {
    let deadline = tokio::time::Instant::now() + cap;
    loop {
        let orders = service.list_orders(identity).await?;
        if orders.iter().all(|order| order.status.is_terminal()) {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            warn!("gave up waiting for pending orders to settle");
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
