use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rust_decimal::Decimal;
use tokio::runtime::Runtime;

use stockledger_core::{ActorId, ProductId, TenantContext, TenantId, WarehouseId};
use stockledger_inventory::{CreateMovement, MovementType, NewProduct, NewWarehouse};
use stockledger_infra::{CatalogService, InMemoryLedgerStore, LedgerQueries, MovementEngine};

const ACTOR: ActorId = ActorId::new(1);

struct Bench {
    engine: MovementEngine<InMemoryLedgerStore>,
    queries: LedgerQueries<InMemoryLedgerStore>,
    tenant: TenantContext,
    products: Vec<ProductId>,
    warehouse: WarehouseId,
    purchase: CreateMovement,
    transfer: CreateMovement,
}

fn setup(rt: &Runtime, products: usize) -> Bench {
    rt.block_on(async {
        let store = InMemoryLedgerStore::new();
        let tenant = TenantContext::resolved(TenantId::new());
        let catalog = CatalogService::new(store.clone());

        let mut ids = Vec::new();
        for n in 0..products.max(1) {
            let product = catalog
                .create_product(
                    tenant,
                    Some(ACTOR),
                    NewProduct {
                        sku: format!("SKU-{n}"),
                        name: format!("Product {n}"),
                        price: Decimal::ONE,
                        active: true,
                    },
                )
                .await
                .expect("create product");
            ids.push(product.id);
        }
        let product = ids[0];

        let mut warehouses = Vec::new();
        for name in ["Main", "Overflow"] {
            let w = catalog
                .create_warehouse(
                    tenant,
                    Some(ACTOR),
                    NewWarehouse {
                        name: name.to_string(),
                        is_active: true,
                    },
                )
                .await
                .expect("create warehouse");
            warehouses.push(w.id);
        }

        let engine = MovementEngine::new(store.clone());
        Bench {
            engine,
            queries: LedgerQueries::new(store),
            tenant,
            products: ids,
            warehouse: warehouses[0],
            purchase: CreateMovement::single(
                MovementType::Purchase,
                product,
                Decimal::from(2),
                warehouses[0],
            ),
            transfer: CreateMovement::transfer(product, Decimal::ONE, warehouses[0], warehouses[1]),
        }
    })
}

fn bench_movements(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("movement_engine");
    group.throughput(Throughput::Elements(1));

    let bench = setup(&rt, 1);
    group.bench_function("purchase", |b| {
        b.iter(|| {
            rt.block_on(bench.engine.create_movement(
                bench.tenant,
                Some(ACTOR),
                black_box(&bench.purchase),
            ))
            .expect("purchase")
        })
    });

    let bench = setup(&rt, 1);
    group.bench_function("purchase_then_transfer", |b| {
        b.iter(|| {
            rt.block_on(async {
                bench
                    .engine
                    .create_movement(bench.tenant, Some(ACTOR), &bench.purchase)
                    .await
                    .expect("purchase");
                bench
                    .engine
                    .create_movement(bench.tenant, Some(ACTOR), black_box(&bench.transfer))
                    .await
                    .expect("transfer")
            })
        })
    });
    group.finish();
}

fn bench_list_stock(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("list_stock");

    for products in [10usize, 100] {
        let bench = setup(&rt, products);
        rt.block_on(async {
            for product in &bench.products {
                let request = CreateMovement::single(
                    MovementType::Purchase,
                    *product,
                    Decimal::ONE,
                    bench.warehouse,
                );
                bench
                    .engine
                    .create_movement(bench.tenant, Some(ACTOR), &request)
                    .await
                    .expect("purchase");
            }
        });

        group.bench_with_input(BenchmarkId::from_parameter(products), &products, |b, _| {
            b.iter(|| rt.block_on(bench.queries.list_stock(bench.tenant)).expect("list"))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_movements, bench_list_stock);
criterion_main!(benches);
