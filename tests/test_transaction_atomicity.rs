// tests/test_transaction_atomicity.rs
//
// A layer whose rows fail part-way must leave neither a table nor a catalog entry behind.

mod common;

use common::{spawn_app, unique_name};
use geodata_catalog::storage::{LayerDraft, ObjectRow};
use geodata_catalog::{Error, LayerRef, NewLayer};
use serde_json::json;
use sqlx::Row;

fn row(i: usize) -> ObjectRow {
    ObjectRow {
        geometry: Some(json!({"type": "Point", "coordinates": [8.2 + i as f64 * 0.01, 53.1]})),
        name: Some(format!("Object {}", i)),
        key: Some(format!("K{}", i)),
        additional_properties: json!({"index": i}),
    }
}

fn rows_failing_at(total: usize, fail_at: Option<usize>) -> impl Iterator<Item = geodata_catalog::Result<ObjectRow>> {
    (0..total).map(move |i| {
        if Some(i) == fail_at {
            Err(Error::MissingRecordAttribute {
                record: i,
                attribute: "KEY".to_string(),
            })
        } else {
            Ok(row(i))
        }
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_record_rolls_back_table_and_catalog() {
    let Some(app) = spawn_app().await else { return };
    let storage = &app.storage;

    let metadata = NewLayer {
        name: unique_name("Test Atomic"),
        ..Default::default()
    };
    let draft = LayerDraft::for_table(metadata, Some(4326)).unwrap();

    for fail_at in [0, 3, 9] {
        let result = storage
            .create_table_layer(&draft, 4326, rows_failing_at(10, Some(fail_at)))
            .await;
        assert!(
            matches!(result, Err(Error::MissingRecordAttribute { record, .. }) if record == fail_at),
            "unexpected outcome: {:?}",
            result.map(|l| l.key)
        );

        let relation = sqlx::query("SELECT to_regclass($1) IS NULL AS missing")
            .bind(format!("geodata.{}", draft.table))
            .fetch_one(storage.pool())
            .await
            .unwrap();
        assert!(relation.get::<bool, _>("missing"), "table left behind after failure at {}", fail_at);

        let entry = storage
            .find_layer(&LayerRef::Key(draft.url_key.clone()), true)
            .await
            .unwrap();
        assert!(entry.is_none(), "catalog entry left behind after failure at {}", fail_at);
    }

    // Nothing leaked, so the same name can still be created
    let layer = storage
        .create_table_layer(&draft, 4326, rows_failing_at(10, None))
        .await
        .unwrap();
    assert_eq!(layer.crs, Some(4326));
    assert_eq!(storage.count_objects(&layer).await.unwrap(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_geometry_rolls_back() {
    let Some(app) = spawn_app().await else { return };
    let storage = &app.storage;

    let draft = LayerDraft::for_table(
        NewLayer {
            name: unique_name("Test Bad Geometry"),
            ..Default::default()
        },
        Some(4326),
    )
    .unwrap();

    let rows = (0..3).map(|i| {
        let mut r = row(i);
        if i == 2 {
            r.geometry = Some(json!({"type": "Point", "coordinates": "nowhere"}));
        }
        Ok(r)
    });
    let result = storage.create_table_layer(&draft, 4326, rows).await;
    assert!(matches!(result, Err(Error::Database(_))));

    let entry = storage
        .find_layer(&LayerRef::Key(draft.url_key.clone()), true)
        .await
        .unwrap();
    assert!(entry.is_none());
}
