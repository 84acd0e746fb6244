use mongoph::{config::Config, memory::InMemoryConnector, store::RecordStore};

pub fn store() -> RecordStore<InMemoryConnector> {
    RecordStore::new(InMemoryConnector::new(), Config::builder("mongodb://localhost:27017").build())
}
