#![allow(dead_code)]

use bson::doc;
use mimic_db::{Database, DatabaseConfig, Document, MemoryStore};

pub const COLLECTION: &str = "accounts";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn test_db() -> Database<MemoryStore> {
    test_db_with(DatabaseConfig::default())
}

pub fn test_db_with(config: DatabaseConfig) -> Database<MemoryStore> {
    init_tracing();
    Database::open(MemoryStore::new(), config)
}

/// Insert 5 seed records.
pub fn seed_records(db: &Database<MemoryStore>) {
    db.insert_many(
        COLLECTION,
        vec![
            doc! { "_id": "acct-1", "name": "Acme Corp", "revenue": 50000.0, "status": "active", "region": "east" },
            doc! { "_id": "acct-2", "name": "Globex", "revenue": 80000.0, "status": "snoozed", "region": "west" },
            doc! { "_id": "acct-3", "name": "Initech", "revenue": 12000.0, "status": "rejected", "region": "east" },
            doc! { "_id": "acct-4", "name": "Umbrella", "revenue": 95000.0, "status": "active", "region": "west" },
            doc! { "_id": "acct-5", "name": "Stark Industries", "revenue": 200000.0, "status": "active", "region": "east" },
        ],
    )
    .unwrap();
}

pub fn to_bson(docs: &[Document]) -> Vec<bson::Document> {
    docs.iter().cloned().map(bson::Document::from).collect()
}

pub fn ids(docs: &[Document]) -> Vec<bson::Bson> {
    docs.iter()
        .map(|d| d.get("_id").cloned().map(bson::Bson::from).unwrap_or(bson::Bson::Null))
        .collect()
}
