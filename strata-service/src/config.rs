//! Service configuration.
//!
//! [`ServiceOptions`] is the partial, caller-facing form: every setting is
//! optional. [`ServiceOptions::resolve`] fills each unset setting with its
//! default and produces the immutable [`ServiceConfig`] a service runs on.
//! A sub-config value supplied by the caller replaces the default wholesale;
//! map-valued settings are never merged key by key.
//!
//! The data-only settings can be loaded from YAML:
//!
//! ```yaml
//! pagination:
//!   defaultLimit: 20
//!   maxLimit: 50
//! search:
//!   enabled: true
//!   fields: [name, description]
//! slug:
//!   enabled: true
//! cache:
//!   enabled: true
//!   ttl: 30
//! softDelete: true
//! ```
//!
//! Function-valued settings (slug generator, validators, hooks, custom
//! filters, aggregation pipelines, virtual fields) are set in code.

use crate::hooks::{Hooks, NoHooks};
use crate::slug::{default_generator, default_resolver};
use crate::validation::{DocumentValidator, FieldValidator};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use strata_data::{fields, Document, Entity, Filter, Sort, Stage};

pub type CustomFilter = Arc<dyn Fn(&Value) -> Filter + Send + Sync>;
pub type SlugGenerator = Arc<dyn Fn(&str) -> String + Send + Sync>;
pub type SlugResolver = Arc<dyn Fn(&str, u32) -> String + Send + Sync>;
pub type PipelineBuilder = Arc<dyn Fn(&Document) -> Vec<Stage> + Send + Sync>;
pub type VirtualField = Arc<dyn Fn(&Document) -> Value + Send + Sync>;

const DEFAULT_LIMIT: u64 = 10;
const DEFAULT_MAX_LIMIT: u64 = 100;
const DEFAULT_PAGE: u64 = 1;
const DEFAULT_CACHE_TTL_SECS: f64 = 300.0;
const DEFAULT_SLUG_ATTEMPTS: u32 = 100;

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaginationOptions {
    pub default_limit: Option<u64>,
    pub max_limit: Option<u64>,
    pub default_page: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    pub default_limit: u64,
    pub max_limit: u64,
    pub default_page: u64,
}

impl PaginationOptions {
    fn resolve(self) -> PaginationConfig {
        PaginationConfig {
            default_limit: self.default_limit.unwrap_or(DEFAULT_LIMIT),
            max_limit: self.max_limit.unwrap_or(DEFAULT_MAX_LIMIT),
            default_page: self.default_page.unwrap_or(DEFAULT_PAGE),
        }
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchOptions {
    pub enabled: Option<bool>,
    pub fields: Option<Vec<String>>,
    pub case_sensitive: Option<bool>,
    pub weights: Option<BTreeMap<String, f64>>,
}

impl SearchOptions {
    /// Enabled search over `fields`.
    pub fn on<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            enabled: Some(true),
            fields: Some(fields.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = Some(case_sensitive);
        self
    }

    pub fn weight(mut self, field: &str, weight: f64) -> Self {
        self.weights
            .get_or_insert_with(BTreeMap::new)
            .insert(field.to_string(), weight);
        self
    }

    fn resolve(self) -> SearchConfig {
        SearchConfig {
            enabled: self.enabled.unwrap_or(false),
            fields: self.fields.unwrap_or_default(),
            case_sensitive: self.case_sensitive.unwrap_or(false),
            weights: self.weights.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub enabled: bool,
    pub fields: Vec<String>,
    pub case_sensitive: bool,
    pub weights: BTreeMap<String, f64>,
}

impl SearchConfig {
    /// Every searched field: the plain list followed by weighted fields not
    /// already in it.
    pub fn searched_fields(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.fields.iter().map(String::as_str).collect();
        for field in self.weights.keys() {
            if !out.contains(&field.as_str()) {
                out.push(field);
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterOptions {
    pub allowed_fields: Option<Vec<String>>,
    pub default_sort: Option<Sort>,
    #[serde(skip)]
    pub custom_filters: Option<HashMap<String, CustomFilter>>,
}

impl FilterOptions {
    pub fn allow<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.allowed_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn default_sort(mut self, sort: impl Into<Sort>) -> Self {
        self.default_sort = Some(sort.into());
        self
    }

    /// Translate query key `name` into a filter built from its value instead
    /// of a plain equality match.
    pub fn custom<F>(mut self, name: &str, build: F) -> Self
    where
        F: Fn(&Value) -> Filter + Send + Sync + 'static,
    {
        self.custom_filters
            .get_or_insert_with(HashMap::new)
            .insert(name.to_string(), Arc::new(build));
        self
    }

    fn resolve(self) -> FilterConfig {
        FilterConfig {
            allowed_fields: self.allowed_fields.unwrap_or_default(),
            default_sort: self
                .default_sort
                .unwrap_or_else(|| Sort::desc(fields::CREATED_AT)),
            custom_filters: self.custom_filters.unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct FilterConfig {
    /// Query keys callers may filter on. Empty means unrestricted.
    pub allowed_fields: Vec<String>,
    pub default_sort: Sort,
    pub custom_filters: HashMap<String, CustomFilter>,
}

// ---------------------------------------------------------------------------
// Slug
// ---------------------------------------------------------------------------

#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SlugOptions {
    pub enabled: Option<bool>,
    pub source_field: Option<String>,
    pub target_field: Option<String>,
    pub max_attempts: Option<u32>,
    #[serde(skip)]
    pub generator: Option<SlugGenerator>,
    #[serde(skip)]
    pub resolver: Option<SlugResolver>,
}

impl SlugOptions {
    /// Enabled slugs derived from `source` into `target`.
    pub fn from_field(source: &str, target: &str) -> Self {
        Self {
            enabled: Some(true),
            source_field: Some(source.to_string()),
            target_field: Some(target.to_string()),
            ..Self::default()
        }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// Produce the candidate for collision number `count` (1-based) from the
    /// base slug.
    pub fn resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&str, u32) -> String + Send + Sync + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    fn resolve(self) -> SlugConfig {
        SlugConfig {
            enabled: self.enabled.unwrap_or(false),
            source_field: self.source_field.unwrap_or_else(|| "name".to_string()),
            target_field: self.target_field.unwrap_or_else(|| "slug".to_string()),
            max_attempts: self.max_attempts.unwrap_or(DEFAULT_SLUG_ATTEMPTS),
            generator: self
                .generator
                .unwrap_or_else(|| Arc::new(default_generator) as SlugGenerator),
            resolver: self
                .resolver
                .unwrap_or_else(|| Arc::new(default_resolver) as SlugResolver),
        }
    }
}

#[derive(Clone)]
pub struct SlugConfig {
    pub enabled: bool,
    pub source_field: String,
    pub target_field: String,
    pub max_attempts: u32,
    pub generator: SlugGenerator,
    pub resolver: SlugResolver,
}

// ---------------------------------------------------------------------------
// Expansion
// ---------------------------------------------------------------------------

/// A relation field holding the id (or ids) of records in another collection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandField {
    pub field: String,
    pub collection: String,
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

fn default_id_field() -> String {
    "id".to_string()
}

impl ExpandField {
    pub fn new(field: &str, collection: &str) -> Self {
        Self {
            field: field.to_string(),
            collection: collection.to_string(),
            id_field: default_id_field(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpandOptions {
    pub fields: Option<Vec<ExpandField>>,
    pub default_expand: Option<bool>,
}

impl ExpandOptions {
    pub fn field(mut self, field: ExpandField) -> Self {
        self.fields.get_or_insert_with(Vec::new).push(field);
        self
    }

    pub fn by_default(mut self) -> Self {
        self.default_expand = Some(true);
        self
    }

    fn resolve(self) -> ExpandConfig {
        ExpandConfig {
            fields: self.fields.unwrap_or_default(),
            default_expand: self.default_expand.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandConfig {
    pub fields: Vec<ExpandField>,
    pub default_expand: bool,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct ValidationOptions {
    pub fields: Option<BTreeMap<String, Arc<dyn FieldValidator>>>,
    pub pre: Option<Arc<dyn DocumentValidator>>,
    pub post: Option<Arc<dyn DocumentValidator>>,
}

impl ValidationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, validator: impl FieldValidator + 'static) -> Self {
        self.fields
            .get_or_insert_with(BTreeMap::new)
            .insert(name.to_string(), Arc::new(validator));
        self
    }

    /// Whole-document validator run before the per-field pass.
    pub fn pre(mut self, validator: impl DocumentValidator + 'static) -> Self {
        self.pre = Some(Arc::new(validator));
        self
    }

    /// Whole-document validator run after the per-field pass.
    pub fn post(mut self, validator: impl DocumentValidator + 'static) -> Self {
        self.post = Some(Arc::new(validator));
        self
    }

    fn resolve(self) -> ValidationConfig {
        ValidationConfig {
            fields: self.fields.unwrap_or_default(),
            pre: self.pre,
            post: self.post,
        }
    }
}

#[derive(Clone)]
pub struct ValidationConfig {
    pub fields: BTreeMap<String, Arc<dyn FieldValidator>>,
    pub pre: Option<Arc<dyn DocumentValidator>>,
    pub post: Option<Arc<dyn DocumentValidator>>,
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheOptions {
    pub enabled: Option<bool>,
    /// Time-to-live in seconds.
    pub ttl: Option<f64>,
    pub ignored_fields: Option<Vec<String>>,
}

impl CacheOptions {
    pub fn ttl_secs(ttl: f64) -> Self {
        Self {
            enabled: Some(true),
            ttl: Some(ttl),
            ignored_fields: None,
        }
    }

    pub fn ignore<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.ignored_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    fn resolve(self) -> CacheConfig {
        let secs = self.ttl.unwrap_or(DEFAULT_CACHE_TTL_SECS);
        CacheConfig {
            enabled: self.enabled.unwrap_or(false),
            ttl: Duration::try_from_secs_f64(secs)
                .unwrap_or(Duration::from_secs_f64(DEFAULT_CACHE_TTL_SECS)),
            ignored_fields: self.ignored_fields.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
    /// Query keys dropped before a cache key is computed.
    pub ignored_fields: Vec<String>,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct AggregationOptions {
    pub pipelines: Option<HashMap<String, PipelineBuilder>>,
    pub virtual_fields: Option<BTreeMap<String, VirtualField>>,
}

impl AggregationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named pipeline built from call parameters.
    pub fn pipeline<F>(mut self, name: &str, build: F) -> Self
    where
        F: Fn(&Document) -> Vec<Stage> + Send + Sync + 'static,
    {
        self.pipelines
            .get_or_insert_with(HashMap::new)
            .insert(name.to_string(), Arc::new(build));
        self
    }

    /// Register a computed field added to aggregation and export rows.
    pub fn virtual_field<F>(mut self, name: &str, compute: F) -> Self
    where
        F: Fn(&Document) -> Value + Send + Sync + 'static,
    {
        self.virtual_fields
            .get_or_insert_with(BTreeMap::new)
            .insert(name.to_string(), Arc::new(compute));
        self
    }

    fn resolve(self) -> AggregationConfig {
        AggregationConfig {
            pipelines: self.pipelines.unwrap_or_default(),
            virtual_fields: self.virtual_fields.unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct AggregationConfig {
    pub pipelines: HashMap<String, PipelineBuilder>,
    pub virtual_fields: BTreeMap<String, VirtualField>,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Partial service configuration. See the module docs.
#[derive(Deserialize)]
#[serde(default, rename_all = "camelCase", bound = "")]
pub struct ServiceOptions<T: Entity> {
    pub pagination: Option<PaginationOptions>,
    pub search: Option<SearchOptions>,
    pub filter: Option<FilterOptions>,
    pub slug: Option<SlugOptions>,
    pub expand: Option<ExpandOptions>,
    #[serde(skip)]
    pub validation: Option<ValidationOptions>,
    #[serde(skip)]
    pub hooks: Option<Arc<dyn Hooks<T>>>,
    pub cache: Option<CacheOptions>,
    #[serde(skip)]
    pub aggregation: Option<AggregationOptions>,
    pub soft_delete: Option<bool>,
}

impl<T: Entity> Default for ServiceOptions<T> {
    fn default() -> Self {
        Self {
            pagination: None,
            search: None,
            filter: None,
            slug: None,
            expand: None,
            validation: None,
            hooks: None,
            cache: None,
            aggregation: None,
            soft_delete: None,
        }
    }
}

impl<T: Entity> ServiceOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the data-only settings from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn pagination(mut self, pagination: PaginationOptions) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn search(mut self, search: SearchOptions) -> Self {
        self.search = Some(search);
        self
    }

    pub fn filter(mut self, filter: FilterOptions) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn slug(mut self, slug: SlugOptions) -> Self {
        self.slug = Some(slug);
        self
    }

    pub fn expand(mut self, expand: ExpandOptions) -> Self {
        self.expand = Some(expand);
        self
    }

    pub fn validation(mut self, validation: ValidationOptions) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn hooks(mut self, hooks: impl Hooks<T> + 'static) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }

    pub fn cache(mut self, cache: CacheOptions) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn aggregation(mut self, aggregation: AggregationOptions) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    pub fn soft_delete(mut self, soft_delete: bool) -> Self {
        self.soft_delete = Some(soft_delete);
        self
    }

    /// Fill every unset setting with its default.
    pub fn resolve(self) -> ServiceConfig<T> {
        ServiceConfig {
            pagination: self.pagination.unwrap_or_default().resolve(),
            search: self.search.unwrap_or_default().resolve(),
            filter: self.filter.unwrap_or_default().resolve(),
            slug: self.slug.unwrap_or_default().resolve(),
            expand: self.expand.unwrap_or_default().resolve(),
            validation: self.validation.unwrap_or_default().resolve(),
            hooks: self
                .hooks
                .unwrap_or_else(|| Arc::new(NoHooks) as Arc<dyn Hooks<T>>),
            cache: self.cache.unwrap_or_default().resolve(),
            aggregation: self.aggregation.unwrap_or_default().resolve(),
            soft_delete: self.soft_delete.unwrap_or(true),
        }
    }
}

/// Fully resolved, immutable service configuration.
pub struct ServiceConfig<T: Entity> {
    pub pagination: PaginationConfig,
    pub search: SearchConfig,
    pub filter: FilterConfig,
    pub slug: SlugConfig,
    pub expand: ExpandConfig,
    pub validation: ValidationConfig,
    pub hooks: Arc<dyn Hooks<T>>,
    pub cache: CacheConfig,
    pub aggregation: AggregationConfig,
    pub soft_delete: bool,
}

impl<T: Entity> Default for ServiceConfig<T> {
    fn default() -> Self {
        ServiceOptions::new().resolve()
    }
}
