//! Generic per-entity factory
//!
//! A [`StandardFactory`] binds a schema, the shared store and a set of REST resources into
//! the CRUD, list, filter, sort and paging operations entity factories delegate to. Every
//! storage key is `schema tag + local id`.

pub mod registry;
pub mod resource;
pub mod response;

pub use registry::{EntityFactory, FactoryRegistry};
pub use resource::{Callbacks, ResourceAction, ResourceCall, ResourceConfig};
pub use response::{StoreRspArgs, Stored, SubDocArgs, store_server_rsp, store_server_rsp_joined};

use crate::api::{RestRequest, RestTransport};
use crate::config::{ClientConfig, PagerSettings};
use crate::debug_log::{self, DebugLog};
use crate::filter::{EntityFilterFn, ResourceFilter};
use crate::query::{QueryBuilder, QueryParams};
use crate::resource_list::ResourceList;
use crate::schema::{ConvertFn, FieldType, FilterInit, ModelProp, ReadArgs, Schema};
use crate::sort::{self, INDEX_PROPERTY, SortOption, SortResolver};
use crate::store::{Deleted, SharedStore, StoreFlags, lock};
use crate::value::parse_date;
use anyhow::{Result, anyhow, bail};
use serde_json::{Map, Value, json};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

pub struct StandardFactory {
    name: String,
    schema: Arc<Schema>,
    store: SharedStore,
    resources: HashMap<String, ResourceConfig>,
    transport: Option<Arc<dyn RestTransport>>,
    entity_filter: Option<EntityFilterFn>,
    convert: Option<ConvertFn>,
    sort_fn: SortResolver,
    query_builder: QueryBuilder,
    pager_settings: PagerSettings,
    id_field: String,
    log: DebugLog,
    list_log: DebugLog,
    response_log: DebugLog,
}

pub struct StandardFactoryBuilder {
    factory: StandardFactory,
}

impl StandardFactoryBuilder {
    pub fn resource(mut self, name: impl Into<String>, config: ResourceConfig) -> Self {
        self.factory.resources.insert(name.into(), config);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn RestTransport>) -> Self {
        self.factory.transport = Some(transport);
        self
    }

    pub fn entity_filter(mut self, entity_filter: EntityFilterFn) -> Self {
        self.factory.entity_filter = Some(entity_filter);
        self
    }

    pub fn convert(mut self, convert: ConvertFn) -> Self {
        self.factory.convert = Some(convert);
        self
    }

    pub fn sort_resolver(mut self, sort_fn: SortResolver) -> Self {
        self.factory.sort_fn = sort_fn;
        self
    }

    pub fn id_field(mut self, id_field: impl Into<String>) -> Self {
        self.factory.id_field = id_field.into();
        self
    }

    /// Query separators, pager defaults and debug logging from `config`
    pub fn config(mut self, config: &ClientConfig) -> Self {
        self.factory.query_builder = QueryBuilder::from_config(&config.query);
        self.factory.pager_settings = config.pager.clone();
        self.factory.log = DebugLog::from_settings(debug_log::FACTORY, &config.logging);
        self.factory.list_log = DebugLog::from_settings(debug_log::RESOURCE_LIST, &config.logging);
        self.factory.response_log = DebugLog::from_settings(debug_log::RESPONSE, &config.logging);
        self
    }

    pub fn build(self) -> StandardFactory {
        self.factory
    }
}

impl StandardFactory {
    pub fn builder(name: impl Into<String>, schema: Arc<Schema>, store: SharedStore) -> StandardFactoryBuilder {
        let sort_fn = sort::default_sort_resolver(schema.clone());
        StandardFactoryBuilder {
            factory: Self {
                name: name.into(),
                schema,
                store,
                resources: HashMap::new(),
                transport: None,
                entity_filter: None,
                convert: None,
                sort_fn,
                query_builder: QueryBuilder::default(),
                pager_settings: PagerSettings::default(),
                id_field: "_id".to_string(),
                log: DebugLog::disabled(debug_log::FACTORY),
                list_log: DebugLog::disabled(debug_log::RESOURCE_LIST),
                response_log: DebugLog::disabled(debug_log::RESPONSE),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn query_builder(&self) -> &QueryBuilder {
        &self.query_builder
    }

    /// Storage key for a local id
    pub fn key(&self, id: &str) -> String {
        self.schema.key(id)
    }

    // Objects

    pub fn new_obj(&self, id: &str, flags: StoreFlags) -> Result<Value> {
        let key = self.key(id);
        let mut store = lock(&self.store)?;
        let obj = store.objects_mut().create(&key, flags, || self.schema.get_object())?;
        Ok(obj.into_owned())
    }

    pub fn set_obj(&self, id: &str, data: Value, flags: StoreFlags) -> Result<Option<Value>> {
        let key = self.key(id);
        let mut store = lock(&self.store)?;
        let obj = store.objects_mut().set(&key, data, flags, || self.schema.get_object())?;
        Ok(obj.map(|o| o.into_owned()))
    }

    pub fn get_obj(&self, id: &str, flags: StoreFlags) -> Result<Option<Value>> {
        let key = self.key(id);
        let mut store = lock(&self.store)?;
        let obj = store.objects_mut().get_with(&key, flags, || self.schema.get_object())?;
        Ok(obj.map(|o| o.into_owned()))
    }

    /// Reset `id` to the schema's default object
    pub fn init_obj(&self, id: &str, flags: StoreFlags) -> Result<Value> {
        self.new_obj(id, flags | StoreFlags::CREATE_INIT)
    }

    pub fn del_obj(&self, id: &str, flags: StoreFlags) -> Result<Deleted<Value>> {
        let key = self.key(id);
        let mut store = lock(&self.store)?;
        Ok(store.objects_mut().delete(&key, flags))
    }

    pub fn duplicate_obj_with<P>(&self, new_id: &str, src_id: &str, flags: StoreFlags, preset: P) -> Result<Value>
    where
        P: FnOnce(&mut Value, &Value),
    {
        let (new_key, src_key) = (self.key(new_id), self.key(src_id));
        let mut store = lock(&self.store)?;
        let obj = store.objects_mut().duplicate(&new_key, &src_key, flags, preset)?;
        Ok(obj.into_owned())
    }

    pub fn duplicate_obj(&self, new_id: &str, src_id: &str, flags: StoreFlags) -> Result<Value> {
        self.duplicate_obj_with(new_id, src_id, flags, |_, _| {})
    }

    /// Run `f` on the stored object, `None` when it does not exist
    pub fn with_obj<R>(&self, id: &str, f: impl FnOnce(&mut Value) -> R) -> Result<Option<R>> {
        let key = self.key(id);
        let mut store = lock(&self.store)?;
        let obj = store.objects_mut().get(&key, StoreFlags::NOFLAG)?;
        Ok(obj.map(|mut o| f(&mut *o)))
    }

    // Lists

    fn make_list(&self, id: &str, title: &str) -> ResourceList {
        let mut list = ResourceList::new(self.key(id), title, self.schema.clone())
            .with_sort(self.sort_fn.clone(), self.schema.sort_options())
            .with_log(self.list_log.clone());
        if let Some(entity_filter) = &self.entity_filter {
            list = list.with_entity_filter(entity_filter.clone());
        }
        list
    }

    pub fn new_list(&self, id: &str, title: &str, flags: StoreFlags) -> Result<ResourceList> {
        let key = self.key(id);
        let mut store = lock(&self.store)?;
        let list = store.lists_mut().create(&key, flags, || self.make_list(id, title))?;
        Ok(list.into_owned())
    }

    /// Replace the entries of list `id`, creating it only when `flags` allow
    pub fn set_list(&self, id: &str, entries: Vec<Value>, flags: StoreFlags, title: Option<&str>) -> Result<ResourceList> {
        self.store_list(id, entries, flags, title, None)
    }

    fn store_list(
        &self,
        id: &str,
        entries: Vec<Value>,
        flags: StoreFlags,
        title: Option<&str>,
        filter: Option<ResourceFilter>,
    ) -> Result<ResourceList> {
        let key = self.key(id);
        let mut store = lock(&self.store)?;
        let lists = store.lists_mut();

        if !lists.contains(&key) {
            if !flags.do_create_any() {
                bail!("List '{}' does not exist", key);
            }
            lists.create(&key, flags, || self.make_list(id, title.unwrap_or_default()))?;
        }

        let mut list = lists
            .get(&key, StoreFlags::NOFLAG)?
            .ok_or_else(|| anyhow!("List '{}' does not exist", key))?;
        if let Some(title) = title {
            list.set_title(title);
        }
        if let Some(filter) = filter {
            list.set_filter(filter);
        }
        list.set_list(entries, flags);

        self.log.event("set_list", json!({"factory": self.name, "key": key, "count": list.count()}));
        Ok((*list).clone())
    }

    pub fn get_list(&self, id: &str, flags: StoreFlags) -> Result<Option<ResourceList>> {
        let key = self.key(id);
        let mut store = lock(&self.store)?;
        let list = store.lists_mut().get_with(&key, flags, || self.make_list(id, ""))?;
        Ok(list.map(|l| l.into_owned()))
    }

    /// Run `f` on the stored list in place
    pub fn with_list<R>(&self, id: &str, f: impl FnOnce(&mut ResourceList) -> R) -> Result<R> {
        let key = self.key(id);
        let mut store = lock(&self.store)?;
        let mut list = store
            .lists_mut()
            .get(&key, StoreFlags::NOFLAG)?
            .ok_or_else(|| anyhow!("List '{}' does not exist", key))?;
        Ok(f(&mut *list))
    }

    pub fn init_list(&self, id: &str, title: &str, flags: StoreFlags) -> Result<ResourceList> {
        self.new_list(id, title, flags | StoreFlags::CREATE_INIT)
    }

    pub fn del_list(&self, id: &str, flags: StoreFlags) -> Result<Deleted<ResourceList>> {
        let key = self.key(id);
        let mut store = lock(&self.store)?;
        Ok(store.lists_mut().delete(&key, flags))
    }

    /// Copy list `src_id` to `new_id`, renaming the copy and optionally retitling it. Change
    /// listeners of the source are not carried over to the copy.
    pub fn duplicate_list(&self, new_id: &str, src_id: &str, flags: StoreFlags, title: Option<&str>) -> Result<ResourceList> {
        let (new_key, src_key) = (self.key(new_id), self.key(src_id));
        let mut store = lock(&self.store)?;
        let list = store.lists_mut().duplicate(&new_key, &src_key, flags, |dest, src| {
            dest.set_id(new_key.clone());
            dest.drop_shared_listeners(src);
            if let Some(title) = title {
                dest.set_title(title);
            }
        })?;
        Ok(list.into_owned())
    }

    // Filter, sort and pager

    pub fn new_filter(&self, base: Option<&Map<String, Value>>) -> ResourceFilter {
        ResourceFilter::new(self.schema.clone(), base)
    }

    pub fn get_filter(&self, init: FilterInit<'_>) -> Map<String, Value> {
        self.schema.get_filter(init)
    }

    pub fn apply_filter(&self, id: &str, filter_by: Option<Map<String, Value>>) -> Result<usize> {
        self.with_list(id, |list| list.apply_filter(filter_by))?
    }

    pub fn sort_options(&self) -> Vec<SortOption> {
        self.schema.sort_options()
    }

    pub fn sort_fn(&self) -> SortResolver {
        self.sort_fn.clone()
    }

    pub fn sort_list(&self, id: &str, sort_by: Option<String>) -> Result<bool> {
        self.with_list(id, |list| list.sort(None, None, sort_by))?
    }

    /// Attach a pager to list `id`, with configured defaults for missing sizes
    pub fn new_pager(&self, id: &str, items_per_page: Option<usize>, max_disp_pages: Option<usize>) -> Result<()> {
        let per_page = items_per_page.unwrap_or(self.pager_settings.per_page);
        let max_pages = max_disp_pages.unwrap_or(self.pager_settings.max_disp_pages);
        self.with_list(id, |list| list.new_pager(per_page, max_pages).map(|_| ()))?
    }

    pub fn build_query(&self, filter_by: &Map<String, Value>) -> QueryParams {
        self.query_builder.build_query_from(self.schema.fields(), filter_by)
    }

    // Reading and storing responses

    /// Read a payload through the schema, using the factory's convert hook unless `args`
    /// brings its own
    pub fn read_rsp_object(&self, payload: &Value, args: &ReadArgs<'_>) -> Result<Value> {
        match (&args.convert, &self.convert) {
            (None, Some(convert)) => {
                let args = ReadArgs {
                    convert: Some(convert.clone()),
                    ..args.clone()
                };
                self.schema.read(payload, &args)
            }
            _ => self.schema.read(payload, args),
        }
    }

    /// Read `payload` and run it through the response pipeline. Embedded references stay
    /// raw so each sub-document is read once, by its own factory, with its id intact.
    pub fn store_rsp_object(&self, payload: &Value, args: StoreRspArgs, registry: &FactoryRegistry) -> Result<Stored> {
        let read = self.read_rsp_object(payload, &ReadArgs::new())?;
        store_server_rsp(self, read, args, registry)
    }

    // REST

    pub fn resource(&self, name: &str) -> Result<&ResourceConfig> {
        self.resources
            .get(name)
            .ok_or_else(|| anyhow!("Factory '{}' has no resource '{}'", self.name, name))
    }

    fn transport(&self) -> Result<&Arc<dyn RestTransport>> {
        self.transport
            .as_ref()
            .ok_or_else(|| anyhow!("Factory '{}' has no REST transport", self.name))
    }

    async fn send_action(
        &self,
        resource: &str,
        action_name: &str,
        params: HashMap<String, String>,
        body: Option<Value>,
    ) -> Result<Value> {
        let config = self.resource(resource)?;
        let action = config.action(action_name)?;
        let (path, params) = config.request_path(action, &params)?;

        let mut request = RestRequest::new(action.method, path).with_params(params);
        if let Some(body) = body {
            request = request.with_body(body);
        }

        self.log.event(
            "resource_call",
            json!({"factory": self.name, "resource": resource, "action": action_name, "path": request.path}),
        );

        let response = self.transport()?.send(request).await?;
        if action.is_array != response.is_array() {
            bail!(
                "Action '{}' of resource '{}' expected {} response",
                action_name,
                resource,
                if action.is_array { "an array" } else { "an object" }
            );
        }
        Ok(response)
    }

    /// Call `action` on `resource`, running the call's callbacks on the outcome
    pub async fn resource_method(&self, resource: &str, action: &str, call: ResourceCall<'_>) -> Result<Value> {
        let ResourceCall { params, body, callbacks } = call;
        let result = self.send_action(resource, action, params, body).await;
        if let Err(err) = &result {
            self.log.warn(format!("{} {}.{} failed: {}", self.name, resource, action, err));
        }
        callbacks.resolve(result)
    }

    pub async fn get(&self, resource: &str, call: ResourceCall<'_>) -> Result<Value> {
        self.resource_method(resource, resource::GET, call).await
    }

    pub async fn query(&self, resource: &str, call: ResourceCall<'_>) -> Result<Value> {
        self.resource_method(resource, resource::QUERY, call).await
    }

    pub async fn save(&self, resource: &str, call: ResourceCall<'_>) -> Result<Value> {
        self.resource_method(resource, resource::SAVE, call).await
    }

    pub async fn save_many(&self, resource: &str, call: ResourceCall<'_>) -> Result<Value> {
        self.resource_method(resource, resource::SAVE_MANY, call).await
    }

    pub async fn update(&self, resource: &str, call: ResourceCall<'_>) -> Result<Value> {
        self.resource_method(resource, resource::UPDATE, call).await
    }

    pub async fn remove(&self, resource: &str, call: ResourceCall<'_>) -> Result<Value> {
        self.resource_method(resource, resource::REMOVE, call).await
    }

    /// Query `resource` with `filter`, stamp each result with its 1-based `index` and store
    /// the results in list `list_id` with the filter applied
    pub async fn get_filtered_resource(
        &self,
        resource: &str,
        list_id: &str,
        filter: &ResourceFilter,
        callbacks: Callbacks<'_, ResourceList>,
    ) -> Result<ResourceList> {
        let result = self.fetch_filtered(resource, list_id, filter).await;
        callbacks.resolve(result)
    }

    async fn fetch_filtered(&self, resource: &str, list_id: &str, filter: &ResourceFilter) -> Result<ResourceList> {
        let params = filter.to_query(&self.query_builder);
        let response = self.send_action(resource, resource::QUERY, params, None).await?;
        let read = self.read_rsp_object(&response, &ReadArgs::new())?;

        let Value::Array(items) = read else {
            bail!("Query of resource '{}' did not return an array", resource);
        };
        let items = items
            .into_iter()
            .enumerate()
            .map(|(index, mut item)| {
                if let Value::Object(map) = &mut item {
                    map.insert(INDEX_PROPERTY.to_string(), json!(index + 1));
                }
                item
            })
            .collect();

        self.store_list(
            list_id,
            items,
            StoreFlags::CREATE | StoreFlags::APPLY_FILTER,
            None,
            Some(filter.clone()),
        )
    }
}

/// Convert hook normalising the schema's date properties to RFC 3339 strings. Values that
/// do not parse are left untouched.
pub fn date_convert(schema: &Schema) -> ConvertFn {
    let date_ids: HashSet<u32> = schema
        .model_props()
        .iter()
        .filter(|p| *p.field_type.element() == FieldType::Date)
        .map(|p| p.id)
        .collect();

    Arc::new(move |prop: &ModelProp, value: Value| {
        if !date_ids.contains(&prop.id) {
            return value;
        }
        let convert_one = |v: Value| match parse_date(&v) {
            Some(date) => Value::String(date.to_rfc3339()),
            None => v,
        };
        match value {
            Value::Array(items) => Value::Array(items.into_iter().map(convert_one).collect()),
            other => convert_one(other),
        }
    })
}

impl EntityFactory for StandardFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn id_field(&self) -> &str {
        &self.id_field
    }

    fn response_log(&self) -> DebugLog {
        self.response_log.clone()
    }

    fn read_rsp_object(&self, payload: &Value, args: &ReadArgs<'_>) -> Result<Value> {
        StandardFactory::read_rsp_object(self, payload, args)
    }

    fn set_obj(&self, id: &str, data: Value, flags: StoreFlags) -> Result<Option<Value>> {
        StandardFactory::set_obj(self, id, data, flags)
    }

    fn set_list(&self, id: &str, list: Vec<Value>, flags: StoreFlags, title: Option<&str>) -> Result<ResourceList> {
        StandardFactory::set_list(self, id, list, flags, title)
    }

    fn duplicate_obj(&self, new_id: &str, src_id: &str, flags: StoreFlags) -> Result<Value> {
        StandardFactory::duplicate_obj(self, new_id, src_id, flags)
    }

    fn duplicate_list(&self, new_id: &str, src_id: &str, flags: StoreFlags, title: Option<&str>) -> Result<ResourceList> {
        StandardFactory::duplicate_list(self, new_id, src_id, flags, title)
    }
}

impl fmt::Debug for StandardFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardFactory")
            .field("name", &self.name)
            .field("schema", &self.schema.name())
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("transport", &self.transport.is_some())
            .field("id_field", &self.id_field)
            .finish()
    }
}
