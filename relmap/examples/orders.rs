use chrono::{Duration, Utc};
use relmap::executor::sqlite::SqliteExecutor;
use relmap::{
    bind_condition_attributes, datetime, define_table, equal, number, sum, Error, Filtered,
    Mapper, Projection, Record, SerializationOptions, SortDirection, Value,
};

define_table! {
    struct Order("order") {
        id: number(),
        order_time: datetime(),
    }
}

define_table! {
    struct OrderDetail("order_detail") {
        id: number(),
        order_id: number(),
        quantity: number(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relmap=debug".into()),
        )
        .init();

    println!("=== relmap - orders over in-memory SQLite ===\n");

    let executor = SqliteExecutor::memory().await?;
    for ddl in [
        "CREATE TABLE \"order\" (id INTEGER PRIMARY KEY, order_time INTEGER NOT NULL)",
        "CREATE TABLE order_detail (id INTEGER PRIMARY KEY, order_id INTEGER NOT NULL, quantity INTEGER NOT NULL)",
    ] {
        sqlx::query(ddl).execute(executor.pool()).await?;
    }

    let order = Order::new()?;
    let detail = OrderDetail::new()?;
    let mapper = Mapper::new(executor, SerializationOptions::default());

    // Orders and their details are written together or not at all
    let order_mapping = order.mapping.clone();
    let detail_mapping = detail.mapping.clone();
    let placed = mapper
        .transaction(move |tx| {
            Box::pin(async move {
                let orders = tx
                    .batch_insert_into(
                        &order_mapping,
                        &[
                            Record::new().with("order_time", Utc::now() - Duration::days(1)),
                            Record::new().with("order_time", Utc::now()),
                        ],
                    )?
                    .returning_all()
                    .await?;

                for (index, placed) in orders.iter().enumerate() {
                    let order_id = placed.get("id").cloned().unwrap_or(Value::Null);
                    tx.insert_into(
                        &detail_mapping,
                        &Record::new()
                            .with("order_id", order_id)
                            .with("quantity", 2 + 3 * index as i64),
                    )?
                    .await?;
                }

                Ok::<_, Error>(orders)
            })
        })
        .await?;

    println!("1. Placed {} orders", placed.len());

    let query = mapper
        .from(&order.mapping)
        .inner_join_equal(&detail.mapping, &detail.order_id, &order.id)?
        .select(
            Projection::new()
                .field("orderId", &order.id)
                .field("orderTime", &order.order_time)
                .field("quantity", &detail.quantity),
        )?
        .order_by(&order.id, SortDirection::Asc)?;
    println!("2. Join:\n   SQL: {}", query.to_sql()?);
    for row in query.await? {
        println!("   {}", row.to_json());
    }

    let totals = mapper
        .from(&detail.mapping)
        .select(Projection::new().field("total", sum(&detail.quantity)))?
        .get_one()
        .await?;
    println!("\n3. Total quantity: {}", totals.to_json());

    // Details of one order, found through the relation condition
    let first = mapper.find_one_by_key(&order.mapping, &Record::new().with("id", 1)).await?;
    if let Some(relation) =
        bind_condition_attributes(&equal(&detail.order_id, &order.id), &order.mapping, &first, true)?
    {
        let details = mapper.select_all_from(&detail.mapping)?.where_(relation).await?;
        println!("\n4. Details of order 1: {}", details.len());
    }

    let updated = mapper
        .update_with(&detail.mapping, &Record::new().with("quantity", 10))?
        .where_equal(&detail.order_id, 2)
        .await?;
    println!("\n5. Updated {} detail rows", updated);

    mapper.delete_from(&detail.mapping).where_equal(&detail.order_id, 1).await?;
    println!(
        "\n6. Remaining details: {}",
        mapper.select_count_from(&detail.mapping).await?
    );

    Ok(())
}
