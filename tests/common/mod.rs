//! Shared fixtures for the integration tests
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use canvass_common::{
    FactoryRegistry, FieldType, ModelProp, ResourceConfig, RestError, RestRequest, RestTransport,
    Schema, SchemaField, SharedStore, StandardFactory, Store,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Transport answering from canned responses keyed by request path
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<String, Result<Value, RestError>>>,
    requests: Mutex<Vec<RestRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, body: Value) {
        self.responses.lock().unwrap().insert(path.to_string(), Ok(body));
    }

    pub fn fail(&self, path: &str, status: u16, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), Err(RestError::new(Some(status), body)));
    }

    pub fn requests(&self) -> Vec<RestRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RestTransport for MockTransport {
    async fn send(&self, request: RestRequest) -> Result<Value> {
        let path = request.path.clone();
        self.requests.lock().unwrap().push(request);

        match self.responses.lock().unwrap().get(&path) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(err)) => Err(err.clone().into()),
            None => Err(RestError::new(Some(404), json!({"path": path})).into()),
        }
    }
}

pub fn town_schema() -> Arc<Schema> {
    let props = vec![
        ModelProp::new(1, "_id", FieldType::ObjectId),
        ModelProp::new(2, "name", FieldType::String),
    ];
    let schema = Schema::new("town", "twn", props)
        .and_then(|s| s.with_field(SchemaField::new("name", "Name", &["name"], FieldType::String)))
        .unwrap();
    Arc::new(schema)
}

pub fn address_schema() -> Arc<Schema> {
    let props = vec![
        ModelProp::new(1, "_id", FieldType::ObjectId),
        ModelProp::new(2, "town", FieldType::String),
        ModelProp::new(3, "county", FieldType::String),
        ModelProp::new(4, "locality", FieldType::ObjectId).with_factory("town"),
    ];
    let schema = Schema::new("address", "addr", props)
        .and_then(|s| s.with_field(SchemaField::new("town", "Town", &["town"], FieldType::String)))
        .and_then(|s| s.with_field(SchemaField::new("county", "County", &["county"], FieldType::String)))
        .unwrap();
    Arc::new(schema)
}

pub fn canvass_schema() -> Arc<Schema> {
    let props = vec![
        ModelProp::new(1, "_id", FieldType::ObjectId),
        ModelProp::new(2, "name", FieldType::String),
        ModelProp::new(3, "start", FieldType::Date),
        ModelProp::new(4, "address", FieldType::ObjectId).with_factory("address"),
        ModelProp::new(5, "addresses", FieldType::array_of(FieldType::ObjectId)).with_factory("address"),
    ];
    let schema = Schema::new("canvass", "cnv", props)
        .and_then(|s| s.with_field(SchemaField::new("name", "Name", &["name"], FieldType::String)))
        .and_then(|s| s.with_field(SchemaField::new("start", "Start", &["start"], FieldType::Date)))
        .unwrap();
    Arc::new(schema)
}

pub struct Fixture {
    pub store: SharedStore,
    pub canvass: Arc<StandardFactory>,
    pub address: Arc<StandardFactory>,
    pub town: Arc<StandardFactory>,
    pub registry: FactoryRegistry,
    pub transport: Arc<MockTransport>,
}

pub fn fixture() -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();

    let store = Store::new().shared();
    let transport = MockTransport::new();

    let canvass = Arc::new(
        StandardFactory::builder("canvass", canvass_schema(), store.clone())
            .resource("canvass", ResourceConfig::new("canvass/:id"))
            .transport(transport.clone())
            .build(),
    );
    let address = Arc::new(
        StandardFactory::builder("address", address_schema(), store.clone())
            .resource("address", ResourceConfig::new("addresses/:id"))
            .transport(transport.clone())
            .build(),
    );

    let town = Arc::new(StandardFactory::builder("town", town_schema(), store.clone()).build());

    let registry = FactoryRegistry::new()
        .with(canvass.clone())
        .with(address.clone())
        .with(town.clone());

    Fixture {
        store,
        canvass,
        address,
        town,
        registry,
        transport,
    }
}
