//! Cached entity lists with a filtered view, pager, selection and sort state
//!
//! Every mutating operation notifies the registered change listeners synchronously,
//! in registration order, exactly once.

use crate::debug_log::{self, DebugLog};
use crate::filter::{self, EntityFilterFn, ResourceFilter};
use crate::pager::Pager;
use crate::schema::Schema;
use crate::sort::{self, SortOption, SortResolver};
use crate::store::{Empty, StoreFlags};
use anyhow::{Result, anyhow, bail};
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::Arc;

/// Called with the list after each change
pub type ChangeListener = Arc<dyn Fn(&ResourceList) + Send + Sync>;

/// Extra predicate kept with the list and re-run on every refilter
pub type ExtraFilterFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Entry property holding selection state
pub const SELECTED_PROPERTY: &str = "isSelected";

#[derive(Clone)]
pub struct ResourceList {
    id: String,
    title: String,
    list: Vec<Value>,
    filter_list: Vec<Value>,
    /// `filter_list` mirrors `list` until a filter is applied
    filter_aliased: bool,
    filter: ResourceFilter,
    entity_filter: Option<EntityFilterFn>,
    extra_filter: Option<ExtraFilterFn>,
    pager: Option<Pager>,
    sort_options: Vec<SortOption>,
    sort_by: Option<String>,
    sort_fn: Option<SortResolver>,
    on_change: Vec<ChangeListener>,
    log: DebugLog,
}

impl ResourceList {
    pub fn new(id: impl Into<String>, title: impl Into<String>, schema: Arc<Schema>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            list: Vec::new(),
            filter_list: Vec::new(),
            filter_aliased: true,
            filter: ResourceFilter::new(schema, None),
            entity_filter: None,
            extra_filter: None,
            pager: None,
            sort_options: Vec::new(),
            sort_by: None,
            sort_fn: None,
            on_change: Vec::new(),
            log: DebugLog::disabled(debug_log::RESOURCE_LIST),
        }
    }

    pub fn with_log(mut self, log: DebugLog) -> Self {
        self.log = log;
        self
    }

    pub fn with_filter(mut self, filter: ResourceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_entity_filter(mut self, entity_filter: EntityFilterFn) -> Self {
        self.entity_filter = Some(entity_filter);
        self
    }

    pub fn with_sort(mut self, sort_fn: SortResolver, sort_options: Vec<SortOption>) -> Self {
        self.sort_fn = Some(sort_fn);
        self.sort_options = sort_options;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn list(&self) -> &[Value] {
        &self.list
    }

    pub fn filter_list(&self) -> &[Value] {
        &self.filter_list
    }

    pub fn count(&self) -> usize {
        self.list.len()
    }

    pub fn filter_count(&self) -> usize {
        self.filter_list.len()
    }

    pub fn is_filtered(&self) -> bool {
        !self.filter_aliased
    }

    pub fn filter(&self) -> &ResourceFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut ResourceFilter {
        &mut self.filter
    }

    pub fn set_filter(&mut self, filter: ResourceFilter) {
        self.filter = filter;
    }

    pub fn set_entity_filter(&mut self, entity_filter: Option<EntityFilterFn>) {
        self.entity_filter = entity_filter;
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.filter.schema()
    }

    // Listeners

    pub fn add_on_change(&mut self, listener: ChangeListener) {
        self.on_change.push(listener);
    }

    pub fn clear_on_change(&mut self) {
        self.on_change.clear();
    }

    /// Remove listeners that are also registered on `other`
    pub fn drop_shared_listeners(&mut self, other: &ResourceList) {
        self.on_change
            .retain(|listener| !other.on_change.iter().any(|theirs| Arc::ptr_eq(listener, theirs)));
    }

    pub fn listener_count(&self) -> usize {
        self.on_change.len()
    }

    fn changed(&self) {
        for listener in &self.on_change {
            listener(self);
        }
    }

    // Pager

    pub fn pager(&self) -> Option<&Pager> {
        self.pager.as_ref()
    }

    pub fn pager_mut(&mut self) -> Option<&mut Pager> {
        self.pager.as_mut()
    }

    /// Attach `pager`, loading it with the current filtered view
    pub fn set_pager(&mut self, mut pager: Pager) {
        pager.set_items(self.filter_list.clone());
        self.pager = Some(pager);
    }

    pub fn new_pager(&mut self, items_per_page: usize, max_disp_pages: usize) -> Result<&mut Pager> {
        let pager = Pager::new(self.id.clone(), self.filter_list.clone(), items_per_page, max_disp_pages)?;
        Ok(self.pager.insert(pager))
    }

    pub fn clear_pager(&mut self) -> Option<Pager> {
        self.pager.take()
    }

    fn update_pager(&mut self) {
        if let Some(pager) = self.pager.as_mut() {
            pager.set_items(self.filter_list.clone());
        }
    }

    // View maintenance

    fn mirror(&mut self) {
        self.filter_aliased = true;
        self.filter_list = self.list.clone();
        self.update_pager();
    }

    fn refilter(&mut self) {
        self.filter.remember();
        let extra = self.extra_filter.as_deref().map(|f| f as &dyn Fn(&Value) -> bool);
        self.filter_list = match self.filter.custom_function() {
            Some(custom) => custom(&self.filter, &self.list),
            None => filter::get_filtered_array(&self.filter, &self.list, self.entity_filter.as_ref(), extra),
        };
        self.filter_aliased = false;
        self.update_pager();
        self.log.event(
            "filter",
            json!({"list": self.id, "count": self.list.len(), "filtered": self.filter_list.len()}),
        );
    }

    /// After a list change: refilter when asked to, otherwise keep an unfiltered view in step
    fn sync_after_change(&mut self, flags: StoreFlags) {
        if flags.do_apply_filter() {
            self.refilter();
        } else if self.filter_aliased {
            self.mirror();
        }
    }

    /// Keep the view consistent whatever state it is in
    fn sync_view(&mut self) {
        if self.filter_aliased {
            self.mirror();
        } else {
            self.refilter();
        }
    }

    // List operations

    /// Replace the base list
    pub fn set_list(&mut self, list: Vec<Value>, flags: StoreFlags) {
        self.list = list;
        if flags.do_apply_filter() {
            self.refilter();
        } else {
            self.mirror();
        }
        self.log.event("set_list", json!({"list": self.id, "count": self.list.len()}));
        self.changed();
    }

    /// Append `entries`, skipping ones already present when `dedupe` is set. `compare`
    /// defaults to equality. Returns the number added.
    pub fn add_to_list(
        &mut self,
        entries: Vec<Value>,
        flags: StoreFlags,
        dedupe: bool,
        compare: Option<&dyn Fn(&Value, &Value) -> bool>,
    ) -> usize {
        let mut added = 0;
        for entry in entries {
            let present = dedupe
                && self.list.iter().any(|existing| match compare {
                    Some(compare) => compare(existing, &entry),
                    None => existing == &entry,
                });
            if !present {
                self.list.push(entry);
                added += 1;
            }
        }

        if added > 0 {
            self.sync_after_change(flags);
            self.changed();
        }
        added
    }

    /// Remove the first match of each of `entries`. Returns the number removed.
    pub fn remove_from_list(
        &mut self,
        entries: &[Value],
        flags: StoreFlags,
        compare: Option<&dyn Fn(&Value, &Value) -> bool>,
    ) -> usize {
        let mut removed = 0;
        for entry in entries {
            let position = self.list.iter().position(|existing| match compare {
                Some(compare) => compare(existing, entry),
                None => existing == entry,
            });
            if let Some(index) = position {
                self.list.remove(index);
                removed += 1;
            }
        }

        if removed > 0 {
            self.sync_after_change(flags);
            self.changed();
        }
        removed
    }

    pub fn find_in_list<P>(&self, predicate: P, start: usize) -> Option<&Value>
    where
        P: Fn(&Value) -> bool,
    {
        self.list.iter().skip(start).find(|entry| predicate(entry))
    }

    pub fn find_index_in_list<P>(&self, predicate: P, start: usize) -> Option<usize>
    where
        P: Fn(&Value) -> bool,
    {
        self.list
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, entry)| predicate(entry))
            .map(|(index, _)| index)
    }

    pub fn for_each_in_list<F>(&self, mut f: F)
    where
        F: FnMut(usize, &Value),
    {
        for (index, entry) in self.list.iter().enumerate() {
            f(index, entry);
        }
    }

    pub fn get(&self, index: usize) -> Result<&Value> {
        self.list
            .get(index)
            .ok_or_else(|| anyhow!("List '{}' index {} out of range ({} entries)", self.id, index, self.list.len()))
    }

    pub fn set(&mut self, index: usize, value: Value) -> Result<()> {
        let count = self.list.len();
        let slot = self
            .list
            .get_mut(index)
            .ok_or_else(|| anyhow!("List '{}' index {} out of range ({} entries)", self.id, index, count))?;
        *slot = value;
        self.sync_view();
        self.changed();
        Ok(())
    }

    // Filtering

    /// Filter with `filter_by`, or the current criteria when `None`. Drops any extra
    /// predicate. Returns the filtered count.
    pub fn apply_filter(&mut self, filter_by: Option<Map<String, Value>>) -> Result<usize> {
        if let Some(filter_by) = filter_by {
            self.filter.set_filter(filter_by)?;
        }
        self.extra_filter = None;
        self.refilter();
        self.changed();
        Ok(self.filter_list.len())
    }

    /// `apply_filter` with an extra predicate run after the entity filter. The predicate
    /// stays part of the filter until the next `apply_filter` or `clear_filter`.
    pub fn apply_filter_with(&mut self, filter_by: Option<Map<String, Value>>, extra: ExtraFilterFn) -> Result<usize> {
        if let Some(filter_by) = filter_by {
            self.filter.set_filter(filter_by)?;
        }
        self.extra_filter = Some(extra);
        self.refilter();
        self.changed();
        Ok(self.filter_list.len())
    }

    /// Drop the filtered view and show the whole list again
    pub fn clear_filter(&mut self) {
        self.filter.clear_filter();
        self.extra_filter = None;
        self.mirror();
        self.changed();
    }

    // Sorting

    pub fn sort_options(&self) -> &[SortOption] {
        &self.sort_options
    }

    pub fn set_sort_options(&mut self, sort_options: Vec<SortOption>) {
        self.sort_options = sort_options;
    }

    pub fn sort_by(&self) -> Option<&str> {
        self.sort_by.as_deref()
    }

    pub fn set_sort_by(&mut self, sort_by: Option<String>) {
        self.sort_by = sort_by;
    }

    pub fn set_sort_fn(&mut self, sort_fn: Option<SortResolver>) {
        self.sort_fn = sort_fn;
    }

    /// Sort the base list. Arguments left as `None` fall back to the list's own resolver,
    /// options and sort key, and supplied ones are remembered. Returns `false` when there is
    /// no sort key.
    pub fn sort(
        &mut self,
        sort_fn: Option<SortResolver>,
        sort_options: Option<Vec<SortOption>>,
        sort_by: Option<String>,
    ) -> Result<bool> {
        if let Some(sort_fn) = sort_fn {
            self.sort_fn = Some(sort_fn);
        }
        if let Some(sort_options) = sort_options {
            self.sort_options = sort_options;
        }
        if let Some(sort_by) = sort_by {
            self.sort_by = Some(sort_by);
        }

        let Some(sort_by) = self.sort_by.clone() else {
            return Ok(false);
        };
        let resolver = self
            .sort_fn
            .clone()
            .ok_or_else(|| anyhow!("List '{}' has no sort function", self.id))?;
        let Some(compare) = resolver(&self.sort_options, &sort_by) else {
            bail!("List '{}' has no sort option for '{}'", self.id, sort_by);
        };

        self.list.sort_by(|a, b| compare(a, b));
        if sort::is_descending_sort_order(&sort_by) {
            self.list.reverse();
        }

        if self.filter_aliased {
            self.mirror();
        } else {
            self.refilter();
        }
        self.log.event("sort", json!({"list": self.id, "sort_by": sort_by}));
        self.changed();
        Ok(true)
    }

    // Selection

    fn is_selected(entry: &Value) -> bool {
        entry.get(SELECTED_PROPERTY).and_then(Value::as_bool).unwrap_or(false)
    }

    fn mark(entry: &mut Value, selected: bool) {
        if let Value::Object(map) = entry {
            map.insert(SELECTED_PROPERTY.to_string(), Value::Bool(selected));
        }
    }

    pub fn sel_count(&self) -> usize {
        self.list.iter().filter(|e| Self::is_selected(e)).count()
    }

    pub fn set_selected(&mut self, index: usize, selected: bool) -> Result<()> {
        let count = self.list.len();
        let entry = self
            .list
            .get_mut(index)
            .ok_or_else(|| anyhow!("List '{}' index {} out of range ({} entries)", self.id, index, count))?;
        Self::mark(entry, selected);
        self.sync_view();
        self.changed();
        Ok(())
    }

    /// Flip selection of an entry, returning the new state
    pub fn toggle_selected(&mut self, index: usize) -> Result<bool> {
        let selected = !Self::is_selected(self.get(index)?);
        self.set_selected(index, selected)?;
        Ok(selected)
    }

    pub fn select_all(&mut self, selected: bool) {
        for entry in &mut self.list {
            Self::mark(entry, selected);
        }
        self.sync_view();
        self.changed();
    }

    pub fn selected(&self) -> Vec<&Value> {
        self.list.iter().filter(|e| Self::is_selected(e)).collect()
    }
}

impl Default for ResourceList {
    fn default() -> Self {
        Self::new("", "", Arc::new(Schema::default()))
    }
}

impl Empty for ResourceList {
    fn empty() -> Self {
        Self::default()
    }
}

impl fmt::Debug for ResourceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceList")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("count", &self.list.len())
            .field("filter_count", &self.filter_list.len())
            .field("filter", &self.filter)
            .field("extra_filter", &self.extra_filter.is_some())
            .field("pager", &self.pager.as_ref().map(Pager::current_page))
            .field("sort_by", &self.sort_by)
            .field("listeners", &self.on_change.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, ModelProp, SchemaField};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn schema() -> Arc<Schema> {
        let props = vec![
            ModelProp::new(1, "name", FieldType::String),
            ModelProp::new(2, "age", FieldType::Number),
        ];
        let schema = Schema::new("person", "per", props)
            .and_then(|s| s.with_field(SchemaField::new("name", "Name", &["name"], FieldType::String)))
            .and_then(|s| s.with_field(SchemaField::new("age", "Age", &["age"], FieldType::Number)))
            .unwrap();
        Arc::new(schema)
    }

    fn people() -> Vec<Value> {
        vec![
            json!({"name": "Cara", "age": 41}),
            json!({"name": "Aoife", "age": 23}),
            json!({"name": "Brian", "age": 35}),
        ]
    }

    fn counting(list: &mut ResourceList) -> Arc<AtomicUsize> {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        list.add_on_change(Arc::new(move |_list: &ResourceList| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        calls
    }

    #[test]
    fn test_add_to_list_dedupes() {
        let mut list = ResourceList::new("l", "List", schema());
        list.add_to_list(vec![json!(1), json!(2), json!(3)], StoreFlags::NOFLAG, true, None);
        list.add_to_list(vec![json!(2), json!(4)], StoreFlags::NOFLAG, true, None);

        assert_eq!(list.list(), &[json!(1), json!(2), json!(3), json!(4)]);
        assert_eq!(list.count(), 4);
        assert_eq!(list.filter_count(), 4);
    }

    #[test]
    fn test_listeners_fire_once_per_change() {
        let mut list = ResourceList::new("l", "List", schema());
        let calls = counting(&mut list);

        list.set_list(people(), StoreFlags::APPLY_FILTER);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        list.add_to_list(vec![json!({"name": "Dara"})], StoreFlags::APPLY_FILTER, true, None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert_eq!(list.add_to_list(vec![json!({"name": "Dara"})], StoreFlags::NOFLAG, true, None), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert_eq!(list.remove_from_list(&[json!({"name": "Nobody"})], StoreFlags::NOFLAG, None), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert_eq!(list.remove_from_list(&[json!({"name": "Dara"})], StoreFlags::NOFLAG, None), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        list.apply_filter(None).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        list.clear_on_change();
        list.set_list(Vec::new(), StoreFlags::NOFLAG);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_custom_compare() {
        let mut list = ResourceList::new("l", "List", schema());
        list.set_list(people(), StoreFlags::NOFLAG);
        let same_name: &dyn Fn(&Value, &Value) -> bool = &|a, b| a["name"] == b["name"];

        let added = list.add_to_list(vec![json!({"name": "Cara", "age": 99})], StoreFlags::NOFLAG, true, Some(same_name));
        assert_eq!(added, 0);
        let removed = list.remove_from_list(&[json!({"name": "Brian"})], StoreFlags::NOFLAG, Some(same_name));
        assert_eq!(removed, 1);
        assert_eq!(list.count(), 2);
    }

    #[test]
    fn test_find_and_index_access() {
        let mut list = ResourceList::new("l", "List", schema());
        list.set_list(people(), StoreFlags::NOFLAG);

        assert_eq!(list.find_index_in_list(|e| e["age"] == json!(35), 0), Some(2));
        assert_eq!(list.find_index_in_list(|e| e["age"] == json!(41), 1), None);
        assert_eq!(list.find_in_list(|e| e["name"] == json!("Aoife"), 0), Some(&people()[1]));

        let mut names = Vec::new();
        list.for_each_in_list(|_, e| names.push(e["name"].clone()));
        assert_eq!(names.len(), 3);

        assert!(list.get(3).is_err());
        assert!(list.set(3, json!({})).is_err());
        list.set(0, json!({"name": "Ciara", "age": 41})).unwrap();
        assert_eq!(list.filter_list()[0]["name"], json!("Ciara"));
    }

    #[test]
    fn test_filter_view_and_pager() {
        let mut list = ResourceList::new("l", "List", schema());
        list.set_list(people(), StoreFlags::NOFLAG);
        list.new_pager(1, 3).unwrap();
        assert_eq!(list.pager().map(Pager::total_pages), Some(3));

        let mut criteria = Map::new();
        criteria.insert("name".to_string(), json!("I"));
        assert_eq!(list.apply_filter(Some(criteria)).unwrap(), 2);
        assert!(list.is_filtered());
        assert_eq!(list.pager().map(Pager::total_items), Some(2));

        let older: ExtraFilterFn = Arc::new(|e: &Value| e["age"].as_i64().unwrap_or(0) > 30);
        assert_eq!(list.apply_filter_with(None, older).unwrap(), 1);

        list.add_to_list(vec![json!({"name": "Iris", "age": 50})], StoreFlags::NOFLAG, false, None);
        assert_eq!(list.filter_count(), 1);
        list.add_to_list(vec![json!({"name": "Liam", "age": 20})], StoreFlags::APPLY_FILTER, false, None);
        assert_eq!(list.filter_count(), 2);

        assert_eq!(list.apply_filter(None).unwrap(), 4);

        list.clear_filter();
        assert_eq!(list.filter_count(), list.count());
    }

    #[test]
    fn test_custom_function_replaces_filtering() {
        let mut list = ResourceList::new("l", "List", schema());
        list.filter_mut()
            .set_custom_function(Some(Arc::new(|_filter: &ResourceFilter, entries: &[Value]| {
                entries.iter().rev().take(1).cloned().collect()
            })));
        list.set_list(people(), StoreFlags::APPLY_FILTER);
        assert_eq!(list.filter_list(), &[json!({"name": "Brian", "age": 35})]);
    }

    #[test]
    fn test_sort_ascending_and_descending() {
        let schema = schema();
        let mut list = ResourceList::new("l", "List", schema.clone())
            .with_sort(sort::default_sort_resolver(schema.clone()), schema.sort_options());
        list.set_list(people(), StoreFlags::NOFLAG);
        let calls = counting(&mut list);

        assert!(list.sort(None, None, Some("per0".to_string())).unwrap());
        let names: Vec<_> = list.filter_list().iter().map(|e| e["name"].clone()).collect();
        assert_eq!(names, vec![json!("Aoife"), json!("Brian"), json!("Cara")]);

        assert!(list.sort(None, None, Some("-per1".to_string())).unwrap());
        let ages: Vec<_> = list.list().iter().map(|e| e["age"].clone()).collect();
        assert_eq!(ages, vec![json!(41), json!(35), json!(23)]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(list.sort(None, None, Some("bogus".to_string())).is_err());
        assert!(!ResourceList::default().sort(None, None, None).unwrap());
    }

    #[test]
    fn test_extra_predicate_survives_sort_and_edits() {
        let schema = schema();
        let mut list = ResourceList::new("l", "List", schema.clone())
            .with_sort(sort::default_sort_resolver(schema.clone()), schema.sort_options());
        list.set_list(people(), StoreFlags::NOFLAG);

        let older: ExtraFilterFn = Arc::new(|e: &Value| e["age"].as_i64().unwrap_or(0) > 30);
        assert_eq!(list.apply_filter_with(Some(Map::new()), older).unwrap(), 2);

        assert!(list.sort(None, None, Some("per0".to_string())).unwrap());
        assert_eq!(list.filter_count(), 2);
        let names: Vec<_> = list.filter_list().iter().map(|e| e["name"].clone()).collect();
        assert_eq!(names, vec![json!("Brian"), json!("Cara")]);

        list.set_selected(0, true).unwrap();
        assert_eq!(list.filter_count(), 2);
        list.set(0, json!({"name": "Aoife", "age": 33})).unwrap();
        assert_eq!(list.filter_count(), 3);

        list.clear_filter();
        assert_eq!(list.filter_count(), 3);
    }

    #[test]
    fn test_selection() {
        let mut list = ResourceList::new("l", "List", schema());
        list.set_list(people(), StoreFlags::NOFLAG);

        assert!(list.toggle_selected(1).unwrap());
        assert_eq!(list.sel_count(), 1);
        assert!(!list.toggle_selected(1).unwrap());
        assert_eq!(list.sel_count(), 0);

        list.select_all(true);
        assert_eq!(list.sel_count(), 3);
        assert_eq!(list.filter_list()[2][SELECTED_PROPERTY], json!(true));
        list.set_selected(0, false).unwrap();
        assert_eq!(list.selected().len(), 2);
        assert!(list.set_selected(9, true).is_err());
    }
}
